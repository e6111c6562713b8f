use chrono::Utc;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::error::Result;

use super::types::{
    AttemptEvent, Cancelled, Committed, Committing, CreateAttempt, Failed, Pending,
};

impl CreateAttempt<Pending> {
    /// Report progress to observers. Only pending attempts can make progress.
    pub fn notify(&self, progress: Value) {
        self.emit(AttemptEvent::Progress(progress));
    }

    /// Commit the attempt: send `payload` as the new record.
    ///
    /// The write runs in a spawned task, so the scaffold is updated whether or
    /// not the returned attempt is ever completed.
    ///
    /// # Errors
    /// Fails if no tokio runtime is available. The attempt is then dropped
    /// without sending anything or notifying observers.
    #[tracing::instrument(skip(self, payload), fields(attempt_id = %self.id))]
    pub fn resolve(self, payload: Value) -> Result<CreateAttempt<Committing>> {
        let runtime = Handle::try_current()?;

        self.emit(AttemptEvent::Committing);
        let result_rx =
            self.state
                .committer
                .commit(&runtime, self.id, payload, self.events.clone());

        tracing::debug!("Create attempt committing");

        Ok(CreateAttempt {
            id: self.id,
            state: Committing {
                created_at: self.state.created_at,
                started_at: Utc::now(),
                result_rx,
            },
            events: self.events,
        })
    }

    /// Abandon the attempt. Nothing is sent.
    #[tracing::instrument(skip(self, reason), fields(attempt_id = %self.id))]
    pub fn reject(self, reason: Value) -> CreateAttempt<Cancelled> {
        self.emit(AttemptEvent::Cancelled(reason.clone()));
        tracing::debug!("Create attempt rejected");

        CreateAttempt {
            id: self.id,
            state: Cancelled {
                reason,
                cancelled_at: Utc::now(),
            },
            events: self.events,
        }
    }
}

impl CreateAttempt<Committing> {
    /// Wait for the write request to finish.
    ///
    /// Returns:
    /// - `Ok(committed)` with the record the server returned
    /// - `Err(failed)` if the request failed or the server rejected it
    pub async fn complete(
        self,
    ) -> std::result::Result<CreateAttempt<Committed>, CreateAttempt<Failed>> {
        let CreateAttempt { id, state, events } = self;

        match state.result_rx.await {
            Ok(Ok(record)) => Ok(CreateAttempt {
                id,
                state: Committed {
                    record,
                    started_at: state.started_at,
                    completed_at: Utc::now(),
                },
                events,
            }),
            Ok(Err(e)) => Err(CreateAttempt {
                id,
                state: Failed {
                    error: e.to_string(),
                    status: e.status(),
                    failed_at: Utc::now(),
                },
                events,
            }),
            Err(_) => Err(CreateAttempt {
                id,
                state: Failed {
                    error: "Create task terminated unexpectedly".to_string(),
                    status: None,
                    failed_at: Utc::now(),
                },
                events,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::{broadcast, oneshot};

    use super::*;
    use crate::create::types::{AttemptId, AttemptStatus, Committer};
    use crate::error::ScaffoldError;

    /// Answers every commit immediately, echoing the payload or failing.
    #[derive(Default)]
    struct StubCommitter {
        fail_with: Option<u16>,
        committed: Mutex<Vec<Value>>,
    }

    impl Committer for StubCommitter {
        fn commit(
            &self,
            _runtime: &Handle,
            _id: AttemptId,
            payload: Value,
            _events: broadcast::Sender<AttemptEvent>,
        ) -> oneshot::Receiver<Result<Value>> {
            self.committed.lock().push(payload.clone());
            let (tx, rx) = oneshot::channel();
            let result = match self.fail_with {
                Some(status) => Err(ScaffoldError::Status {
                    status,
                    body: "rejected".into(),
                }),
                None => Ok(payload),
            };
            let _ = tx.send(result);
            rx
        }
    }

    /// Drops the sender without answering.
    #[derive(Default)]
    struct DroppingCommitter;

    impl Committer for DroppingCommitter {
        fn commit(
            &self,
            _runtime: &Handle,
            _id: AttemptId,
            _payload: Value,
            _events: broadcast::Sender<AttemptEvent>,
        ) -> oneshot::Receiver<Result<Value>> {
            let (_tx, rx) = oneshot::channel();
            rx
        }
    }

    #[test]
    fn test_new_attempt_is_pending() {
        let attempt = CreateAttempt::new(Arc::new(StubCommitter::default()));
        assert_eq!(attempt.status(), AttemptStatus::Pending);
    }

    #[tokio::test]
    async fn test_resolve_then_complete() {
        let committer = Arc::new(StubCommitter::default());
        let attempt = CreateAttempt::new(committer.clone());
        let id = attempt.id;

        let committing = attempt.resolve(json!({"name": "Rex"})).unwrap();
        assert_eq!(committing.status(), AttemptStatus::Committing);
        assert_eq!(committing.id, id);

        let committed = committing.complete().await.unwrap();
        assert_eq!(committed.status(), AttemptStatus::Committed);
        assert_eq!(committed.state.record, json!({"name": "Rex"}));
        assert_eq!(committer.committed.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_carries_status() {
        let committer = Arc::new(StubCommitter {
            fail_with: Some(422),
            ..Default::default()
        });
        let attempt = CreateAttempt::new(committer);

        let failed = attempt
            .resolve(json!({}))
            .unwrap()
            .complete()
            .await
            .unwrap_err();
        assert_eq!(failed.status(), AttemptStatus::Failed);
        assert_eq!(failed.state.status, Some(422));
        assert!(failed.state.error.contains("rejected"));
    }

    #[tokio::test]
    async fn test_dropped_commit_task_fails_attempt() {
        let attempt = CreateAttempt::new(Arc::new(DroppingCommitter));
        let failed = attempt
            .resolve(json!({}))
            .unwrap()
            .complete()
            .await
            .unwrap_err();
        assert_eq!(failed.state.status, None);
        assert!(failed.state.error.contains("terminated"));
    }

    #[tokio::test]
    async fn test_reject_sends_nothing() {
        let committer = Arc::new(StubCommitter::default());
        let attempt = CreateAttempt::new(committer.clone());
        let mut events = attempt.subscribe();

        let cancelled = attempt.reject(json!("changed my mind"));
        assert_eq!(cancelled.status(), AttemptStatus::Cancelled);
        assert_eq!(cancelled.state.reason, json!("changed my mind"));
        assert!(committer.committed.lock().is_empty());

        assert_eq!(
            events.recv().await.unwrap(),
            AttemptEvent::Cancelled(json!("changed my mind"))
        );
    }

    #[tokio::test]
    async fn test_progress_then_committing_events() {
        let attempt = CreateAttempt::new(Arc::new(StubCommitter::default()));
        let mut events = attempt.subscribe();

        attempt.notify(json!({"step": 1}));
        attempt.notify(json!({"step": 2}));
        let _committing = attempt.resolve(json!({})).unwrap();

        assert_eq!(events.recv().await.unwrap(), AttemptEvent::Progress(json!({"step": 1})));
        assert_eq!(events.recv().await.unwrap(), AttemptEvent::Progress(json!({"step": 2})));
        assert_eq!(events.recv().await.unwrap(), AttemptEvent::Committing);
    }

    #[test]
    fn test_resolve_outside_runtime_fails() {
        let committer = Arc::new(StubCommitter::default());
        let attempt = CreateAttempt::new(committer.clone());
        let mut events = attempt.subscribe();

        let err = attempt.resolve(json!({})).unwrap_err();
        assert!(matches!(err, ScaffoldError::Runtime(_)));
        assert!(committer.committed.lock().is_empty());
        // The attempt is gone and emitted nothing
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }
}
