//! Deferred creation: intent to create, then commit or cancel.

mod transitions;
pub mod types;

pub use types::{
    AttemptEvent, AttemptId, AttemptState, AttemptStatus, Cancelled, Committed, Committing,
    CreateAttempt, Failed, Pending,
};
pub(crate) use types::Committer;
