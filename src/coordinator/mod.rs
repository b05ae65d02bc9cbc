//! Ordering of apply actions across out-of-order fetch completions.

pub mod actor;
pub mod queue;

pub use actor::Coordinator;
pub use queue::{class_of, target_key, ApplyAction, TaskQueue};
