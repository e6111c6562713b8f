//! Core types for deferred creation.
//!
//! A creation attempt separates the intent to create from the commit, using the
//! typestate pattern: `create()` hands out a `CreateAttempt<Pending>` without
//! touching the network, and only `resolve` issues the POST. Each attempt
//! reaches exactly one terminal state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use crate::error::Result;

/// Unique identifier for a creation attempt.
pub type AttemptId = Uuid;

/// Capacity of the per-attempt event channel.
const EVENT_CAPACITY: usize = 16;

/// Where an attempt sends its payload once resolved.
///
/// Implemented by the scaffold; spawns the write onto `runtime` and reports the
/// created record (or the failure) through the returned receiver.
pub(crate) trait Committer: Send + Sync {
    fn commit(
        &self,
        runtime: &Handle,
        id: AttemptId,
        payload: Value,
        events: broadcast::Sender<AttemptEvent>,
    ) -> oneshot::Receiver<Result<Value>>;
}

/// Marker trait for valid attempt states.
pub trait AttemptState: Send + Sync {
    const STATUS: AttemptStatus;
}

/// Coarse status of an attempt, for observers and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Committing,
    Committed,
    Cancelled,
    Failed,
}

/// What observers of an attempt see.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    /// Progress reported while the attempt was pending
    Progress(Value),
    /// The payload has been handed to the transport
    Committing,
    /// The server accepted the record
    Committed(Value),
    /// The attempt was rejected before anything was sent
    Cancelled(Value),
    /// The write request failed
    Failed(String),
}

/// A creation attempt in state `T`.
#[derive(Debug)]
pub struct CreateAttempt<T: AttemptState> {
    pub id: AttemptId,
    pub state: T,
    pub(crate) events: broadcast::Sender<AttemptEvent>,
}

impl<T: AttemptState> CreateAttempt<T> {
    pub fn status(&self) -> AttemptStatus {
        T::STATUS
    }

    /// Observe the events this attempt emits from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AttemptEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

impl CreateAttempt<Pending> {
    pub(crate) fn new(committer: Arc<dyn Committer>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            state: Pending {
                created_at: Utc::now(),
                committer,
            },
            events,
        }
    }
}

// ============================================================================
// Attempt States
// ============================================================================

/// Created, nothing sent yet.
pub struct Pending {
    pub created_at: DateTime<Utc>,
    pub(crate) committer: Arc<dyn Committer>,
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl AttemptState for Pending {
    const STATUS: AttemptStatus = AttemptStatus::Pending;
}

/// POST in flight.
#[derive(Debug)]
pub struct Committing {
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub(crate) result_rx: oneshot::Receiver<Result<Value>>,
}

impl AttemptState for Committing {
    const STATUS: AttemptStatus = AttemptStatus::Committing;
}

/// The server returned the created record.
#[derive(Debug, Clone)]
pub struct Committed {
    pub record: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptState for Committed {
    const STATUS: AttemptStatus = AttemptStatus::Committed;
}

/// Rejected by the caller before committing.
#[derive(Debug, Clone)]
pub struct Cancelled {
    pub reason: Value,
    pub cancelled_at: DateTime<Utc>,
}

impl AttemptState for Cancelled {
    const STATUS: AttemptStatus = AttemptStatus::Cancelled;
}

/// The write request failed.
#[derive(Debug, Clone)]
pub struct Failed {
    pub error: String,
    pub status: Option<u16>,
    pub failed_at: DateTime<Utc>,
}

impl AttemptState for Failed {
    const STATUS: AttemptStatus = AttemptStatus::Failed;
}
