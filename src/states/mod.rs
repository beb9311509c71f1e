//! # Test step abstractions.
//!
//! - [`State`] — trait for one unit of test logic (setup/run phases, timeout,
//!   fatal/recoverable failure reporting)
//! - [`StateRef`] — shared handle to a state (`Arc<dyn State>`)
//! - [`Sequence`] — ordered list of states executed as one test
//! - [`Tag`], [`TagValue`] — named measurements submitted for validation
//!
//! Concrete states are supplied entirely by collaborators; the engine treats
//! every state as opaque and uniform.

mod sequence;
mod state;
mod tag;

pub use sequence::Sequence;
pub use state::{State, StateRef};
pub use tag::{Tag, TagValue};
