//! Result-processing collaborator contract.

use async_trait::async_trait;

use crate::error::{ProcessorError, SequenceError};
use crate::signals::TestId;
use crate::states::TagValue;

/// External collaborator that evaluates tags and aggregates the overall
/// pass/fail verdict of a test.
///
/// States submit tags during a run; the sequencer submits recoverable errors
/// as they occur and calls [`complete_test`](ResultProcessor::complete_test)
/// once at the end of the run to obtain the verdict returned to the
/// orchestrator.
#[async_trait]
pub trait ResultProcessor: Send + Sync + 'static {
    /// Called once when the sequencer opens.
    async fn open(&self) -> Result<(), ProcessorError>;

    /// Submits one tag value; returns whether the value passes validation.
    async fn submit_tag(&self, tag_id: &str, value: &TagValue) -> Result<bool, ProcessorError>;

    /// Records an error observed during the run; makes the test an overall
    /// fail.
    async fn submit_error(&self, error: &SequenceError) -> Result<(), ProcessorError>;

    /// Signals that the test has completed; returns the overall pass/fail
    /// aggregation.
    async fn complete_test(
        &self,
        test_id: TestId,
        sequence_name: &str,
    ) -> Result<bool, ProcessorError>;

    /// Called once when the sequencer closes.
    async fn close(&self) -> Result<(), ProcessorError>;
}
