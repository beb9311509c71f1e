//! Shared fixtures: canned states, a recording result processor, and a
//! channel-driven dispatcher for exercising the engine end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use testrig::{
    Dispatcher, DispatcherError, DispatcherHandle, DispatcherSignals, OrchestratorFeeds,
    ProcessorError, ResultProcessor, ResultsSignal, Sequence, SequenceError, State, StateError,
    StateRef, StatusSignal, Tag, TagValue, TestId,
};

/// Shared, ordered record of which states ran.
pub type RunLog = Arc<Mutex<Vec<String>>>;

pub fn run_log() -> RunLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn sequence(states: Vec<StateRef>) -> Sequence {
    init_tracing();
    Sequence::new("test_sequence", "integration fixture", states)
}

/// Captures engine logs per test; repeat calls are a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ---- States ----

/// Completes both phases immediately.
pub struct DoNothingState;

#[async_trait]
impl State for DoNothingState {
    fn name(&self) -> &str {
        "do_nothing"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Sleeps for a fixed duration during run.
pub struct SleepState {
    pub duration: Duration,
}

#[async_trait]
impl State for SleepState {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.duration + Duration::from_secs(1)
    }
}

/// Appends its name to the shared log when run; used to assert ordering.
pub struct TrackingState {
    pub name: String,
    pub log: RunLog,
}

impl TrackingState {
    pub fn arc(name: impl Into<String>, log: &RunLog) -> StateRef {
        Arc::new(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl State for TrackingState {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        self.log.lock().unwrap().push(self.name.clone());
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Blocks in setup until the step's token is cancelled.
pub struct SlowSetupState;

#[async_trait]
impl State for SlowSetupState {
    fn name(&self) -> &str {
        "slow_setup"
    }

    async fn setup(&self, ctx: CancellationToken) -> Result<(), StateError> {
        ctx.cancelled().await;
        Err(StateError::Canceled)
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(120)
    }
}

/// Fails its setup phase (a fatal condition to the sequencer).
pub struct SetupErrorState;

#[async_trait]
impl State for SetupErrorState {
    fn name(&self) -> &str {
        "setup_error"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Err(StateError::fail("bench power rail unreachable"))
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Fails its run phase with a recoverable error.
pub struct RunErrorState;

#[async_trait]
impl State for RunErrorState {
    fn name(&self) -> &str {
        "run_error"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Err(StateError::fail("sensor readout failed"))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Runs cleanly but reports a fatal hardware condition afterwards.
pub struct RunFatalErrorState {
    tripped: AtomicBool,
}

impl RunFatalErrorState {
    pub fn arc() -> StateRef {
        Arc::new(Self {
            tripped: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl State for RunFatalErrorState {
    fn name(&self) -> &str {
        "run_fatal_error"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        self.tripped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn fatal_error(&self) -> Option<StateError> {
        if self.tripped.load(Ordering::SeqCst) {
            Some(StateError::fail("contactor welded shut"))
        } else {
            None
        }
    }
}

/// Never finishes its run phase; exits only through timeout or cancellation.
pub struct RunForeverState {
    pub timeout: Duration,
}

#[async_trait]
impl State for RunForeverState {
    fn name(&self) -> &str {
        "run_forever"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), StateError> {
        ctx.cancelled().await;
        Err(StateError::Canceled)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Panics during run; the sequencer must survive and classify it as fatal.
pub struct PanicState;

#[async_trait]
impl State for PanicState {
    fn name(&self) -> &str {
        "panic"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        panic!("unexpected bench condition");
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Submits one tag whose pass/fail outcome is fixed up front.
pub struct TagState {
    pub pass: bool,
    pub continue_on_fail: bool,
}

#[async_trait]
impl State for TagState {
    fn name(&self) -> &str {
        "tagged"
    }

    async fn setup(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    async fn run(&self, _ctx: CancellationToken) -> Result<(), StateError> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn continue_on_fail(&self) -> bool {
        self.continue_on_fail
    }

    fn results(&self) -> HashMap<Tag, TagValue> {
        let mut results = HashMap::new();
        results.insert(
            Tag::new("hv_bus_voltage", "high-voltage bus within bounds"),
            TagValue::Bool(self.pass),
        );
        results
    }
}

// ---- Result processor ----

#[derive(Default)]
struct ProcessorState {
    errors: Vec<SequenceError>,
    failed_tags: Vec<String>,
    submitted: Vec<(String, TagValue)>,
    completed: Vec<TestId>,
}

/// Recording processor: a tag passes unless its value is `Bool(false)`; the
/// end-of-run verdict is "no errors and no failed tags", reset per test.
#[derive(Default)]
pub struct SimpleResultProcessor {
    state: Mutex<ProcessorState>,
}

impl SimpleResultProcessor {
    pub fn arc() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completed_tests(&self) -> Vec<TestId> {
        self.state.lock().unwrap().completed.clone()
    }

    pub fn submitted_tags(&self) -> Vec<(String, TagValue)> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl ResultProcessor for SimpleResultProcessor {
    async fn open(&self) -> Result<(), ProcessorError> {
        Ok(())
    }

    async fn submit_tag(&self, tag_id: &str, value: &TagValue) -> Result<bool, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push((tag_id.to_string(), value.clone()));

        let passing = !matches!(value, TagValue::Bool(false));
        if !passing {
            state.failed_tags.push(tag_id.to_string());
        }
        Ok(passing)
    }

    async fn submit_error(&self, error: &SequenceError) -> Result<(), ProcessorError> {
        self.state.lock().unwrap().errors.push(error.clone());
        Ok(())
    }

    async fn complete_test(
        &self,
        test_id: TestId,
        _sequence_name: &str,
    ) -> Result<bool, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        let verdict = state.errors.is_empty() && state.failed_tags.is_empty();
        state.errors.clear();
        state.failed_tags.clear();
        state.completed.push(test_id);
        Ok(verdict)
    }

    async fn close(&self) -> Result<(), ProcessorError> {
        Ok(())
    }
}

// ---- Dispatcher ----

struct Connection {
    handle: DispatcherHandle,
    status: Option<broadcast::Receiver<StatusSignal>>,
    results: Option<broadcast::Receiver<ResultsSignal>>,
}

/// Channel-driven dispatcher: the test drives it through its handle and
/// observes the feeds it received at open.
pub struct SimpleDispatcher {
    name: String,
    close_failure: Option<String>,
    connection: Mutex<Option<Connection>>,
}

impl SimpleDispatcher {
    pub fn arc(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            close_failure: None,
            connection: Mutex::new(None),
        })
    }

    /// Dispatcher whose close always fails, for teardown error collection.
    pub fn arc_failing_close(name: impl Into<String>, message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            close_failure: Some(message.into()),
            connection: Mutex::new(None),
        })
    }

    /// Sending side of the signal channels. Valid after orchestrator open.
    pub fn handle(&self) -> DispatcherHandle {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .expect("dispatcher not opened")
            .handle
            .clone()
    }

    /// Takes the status subscription received at open.
    pub fn take_status(&self) -> broadcast::Receiver<StatusSignal> {
        self.connection
            .lock()
            .unwrap()
            .as_mut()
            .expect("dispatcher not opened")
            .status
            .take()
            .expect("status feed already taken")
    }

    /// Takes the results subscription received at open.
    pub fn take_results(&self) -> broadcast::Receiver<ResultsSignal> {
        self.connection
            .lock()
            .unwrap()
            .as_mut()
            .expect("dispatcher not opened")
            .results
            .take()
            .expect("results feed already taken")
    }
}

#[async_trait]
impl Dispatcher for SimpleDispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self, feeds: OrchestratorFeeds) -> Result<DispatcherSignals, DispatcherError> {
        let (handle, signals) = DispatcherSignals::channel(8);
        *self.connection.lock().unwrap() = Some(Connection {
            handle,
            status: Some(feeds.status),
            results: Some(feeds.results),
        });
        Ok(signals)
    }

    async fn close(&self) -> Result<(), DispatcherError> {
        match &self.close_failure {
            Some(message) => Err(DispatcherError::new(message.clone())),
            None => Ok(()),
        }
    }
}
