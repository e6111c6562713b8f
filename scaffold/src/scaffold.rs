//! The stateful per-resource fetch/create coordinator.
//!
//! A [`Scaffold`] is bound to one [`Model`]. It owns the caller-editable query,
//! the records from the most recent fetch, the UI flags and, when configured,
//! the pagination state. All of it lives in a `watch` channel: every completed
//! request applies its result in a single `send_modify`, so subscribers never
//! observe a half-applied update.
//!
//! Overlapping fetches are tagged with increasing sequence numbers and a result
//! is only applied when it is newer than the last one applied. Responses that
//! arrive out of order are dropped.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use scopeguard::ScopeGuard;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::create::{AttemptEvent, AttemptId, Committer, CreateAttempt, Pending};
use crate::error::{Result, ScaffoldError};
use crate::http::{HttpClient, HttpRequest};
use crate::model::Model;
use crate::pagination::{PageSignal, Paginate, PaginationState};
use crate::query::{compose, ComposedRequest, Query};
use crate::ui::{InFlight, UiState};

/// Everything a view can bind to, as one consistent snapshot.
#[derive(Debug, Clone)]
pub struct ScaffoldState {
    query: Query,
    items: Vec<Value>,
    pagination: Option<PaginationState>,
    in_flight: InFlight,
    last_applied: u64,
}

impl ScaffoldState {
    fn new(query: Query, paginate: Paginate) -> Self {
        Self {
            query,
            items: Vec::new(),
            pagination: paginate.initial_state(),
            in_flight: InFlight::default(),
            last_applied: 0,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn ui(&self) -> UiState {
        self.in_flight.ui()
    }

    pub fn pagination(&self) -> Option<&PaginationState> {
        self.pagination.as_ref()
    }

    fn compose(&self, model: &Model) -> ComposedRequest {
        let page = self.pagination.as_ref().map(PaginationState::params);
        compose(model.url(), model.defaults(), &self.query, page.as_ref())
    }
}

/// Records and page signal from one successful GET.
struct Fetched {
    items: Vec<Value>,
    signal: Option<PageSignal>,
}

struct Shared<H: HttpClient> {
    name: String,
    model: Arc<Model>,
    http: Arc<H>,
    state: watch::Sender<ScaffoldState>,
    tokens: AtomicU64,
    initial_fetch: AsyncMutex<Option<JoinHandle<Result<()>>>>,
}

/// A scaffold bound to a model.
///
/// Cloning is cheap and clones share all state.
pub struct Scaffold<H: HttpClient> {
    shared: Arc<Shared<H>>,
}

impl<H: HttpClient> Clone for Scaffold<H> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<H: HttpClient> fmt::Debug for Scaffold<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scaffold")
            .field("name", &self.shared.name)
            .field("model", &self.shared.model.name())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl<H: HttpClient> Scaffold<H> {
    /// Create a scaffold and issue its first fetch.
    ///
    /// The scaffold is `loading` as soon as this returns. The fetch runs in a
    /// spawned task; [`Scaffold::ready`] waits for it.
    ///
    /// # Errors
    /// Fails if called outside a tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        model: Arc<Model>,
        query: Query,
        paginate: Paginate,
        http: Arc<H>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()?;
        let (state, _) = watch::channel(ScaffoldState::new(query, paginate));

        let scaffold = Self {
            shared: Arc::new(Shared {
                name: name.into(),
                model,
                http,
                state,
                tokens: AtomicU64::new(0),
                initial_fetch: AsyncMutex::new(None),
            }),
        };

        tracing::debug!(
            scaffold = %scaffold.name(),
            model = %scaffold.model().name(),
            paginated = paginate.is_enabled(),
            "Scaffold created"
        );

        let fetch = scaffold.refresh();
        let handle = runtime.spawn(fetch);
        // Nobody else can hold the lock yet
        if let Ok(mut slot) = scaffold.shared.initial_fetch.try_lock() {
            *slot = Some(handle);
        }

        Ok(scaffold)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.shared.model
    }

    /// Whether both handles point at the same scaffold.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Wait for the fetch issued at creation and surface its outcome.
    ///
    /// The outcome is handed to the first call that runs to completion; later
    /// calls return `Ok(())`. A call that is cancelled while waiting leaves the
    /// outcome for the next one.
    pub async fn ready(&self) -> Result<()> {
        let mut slot = self.shared.initial_fetch.lock().await;
        let Some(handle) = slot.as_mut() else {
            return Ok(());
        };
        let joined = handle.await;
        *slot = None;
        joined.map_err(|e| ScaffoldError::TaskTerminated(e.to_string()))?
    }

    // ------------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------------

    pub fn items(&self) -> Vec<Value> {
        self.shared.state.borrow().items.clone()
    }

    pub fn query(&self) -> Query {
        self.shared.state.borrow().query.clone()
    }

    /// Replace the query used by subsequent fetches.
    pub fn set_query(&self, query: Query) {
        self.shared.state.send_modify(|state| state.query = query);
    }

    /// Edit the query used by subsequent fetches in place.
    pub fn update_query(&self, update: impl FnOnce(&mut Query)) {
        self.shared.state.send_modify(|state| update(&mut state.query));
    }

    pub fn ui(&self) -> UiState {
        self.shared.state.borrow().ui()
    }

    pub fn pagination(&self) -> Option<PaginationState> {
        self.shared.state.borrow().pagination.clone()
    }

    /// Known page numbers; empty when pagination is off.
    pub fn pages(&self) -> Vec<u32> {
        self.shared
            .state
            .borrow()
            .pagination
            .as_ref()
            .map(|p| p.pages().to_vec())
            .unwrap_or_default()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.shared
            .state
            .borrow()
            .pagination
            .as_ref()
            .map(PaginationState::current)
    }

    pub fn snapshot(&self) -> ScaffoldState {
        self.shared.state.borrow().clone()
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ScaffoldState> {
        self.shared.state.subscribe()
    }

    /// The request the next fetch would issue.
    pub fn next_request(&self) -> ComposedRequest {
        self.shared.state.borrow().compose(&self.shared.model)
    }

    // ------------------------------------------------------------------------
    // Fetch lifecycle
    // ------------------------------------------------------------------------

    /// Fetch the collection with the current query and page.
    ///
    /// The request URL and `loading` are both fixed as soon as this is called,
    /// before the returned future is polled. Later query or page changes do not
    /// affect it. `loading` is cleared when the request finishes or the future
    /// is dropped. On success `items` is replaced wholesale; on failure it is left
    /// alone and the error is returned.
    pub fn refresh(&self) -> impl Future<Output = Result<()>> + Send + 'static {
        let token = self.next_token();
        let request = self.next_request();
        self.shared
            .state
            .send_modify(|state| state.in_flight.begin_fetch(token));

        let shared = self.shared.clone();
        let guard = scopeguard::guard(token, move |token| {
            shared.state.send_modify(|state| {
                state.in_flight.end_fetch(token);
            });
        });

        let scaffold = self.clone();
        let span = tracing::debug_span!("refresh", scaffold = %self.name(), seq = token);
        async move { scaffold.fetch(request, guard).await }.instrument(span)
    }

    /// Select page `page` and fetch it.
    ///
    /// # Errors
    /// `PaginationDisabled` if the scaffold is not paginated, `InvalidPage` for
    /// page 0. Neither issues a request.
    pub fn page(&self, page: u32) -> impl Future<Output = Result<()>> + Send + 'static {
        let pending = self.select_page(page).map(|()| self.refresh());
        async move { pending?.await }
    }

    fn select_page(&self, page: u32) -> Result<()> {
        let mut outcome = Ok(());
        self.shared.state.send_if_modified(|state| {
            let result = match state.pagination.as_mut() {
                Some(pagination) => pagination.set_current(page),
                None => Err(ScaffoldError::PaginationDisabled(self.shared.name.clone())),
            };
            let changed = result.is_ok();
            outcome = result;
            changed
        });
        outcome
    }

    async fn fetch<F>(&self, request: ComposedRequest, guard: ScopeGuard<u64, F>) -> Result<()>
    where
        F: FnOnce(u64) + Send,
    {
        tracing::debug!(url = %request.url, "Fetching collection");

        let outcome = self.load(&request.url).await;

        // From here on the token is released together with the result
        let token = ScopeGuard::into_inner(guard);

        match outcome {
            Ok(fetched) => {
                let count = fetched.items.len();
                let mut applied = false;
                self.shared.state.send_modify(|state| {
                    state.in_flight.end_fetch(token);
                    if token > state.last_applied {
                        state.items = fetched.items;
                        if let Some(pagination) = state.pagination.as_mut() {
                            pagination.apply(fetched.signal);
                        }
                        state.last_applied = token;
                        applied = true;
                    }
                });

                if applied {
                    tracing::info!(url = %request.url, items = count, "Collection fetched");
                } else {
                    tracing::debug!(url = %request.url, "Discarding stale response");
                }
                Ok(())
            }
            Err(e) => {
                self.shared.state.send_modify(|state| {
                    state.in_flight.end_fetch(token);
                });
                tracing::warn!(url = %request.url, error = %e, "Fetch failed");
                Err(e)
            }
        }
    }

    async fn load(&self, url: &str) -> Result<Fetched> {
        let response = self
            .shared
            .http
            .execute(&HttpRequest::get(url))
            .await?
            .error_for_status()?;

        let signal = PageSignal::from_response(&response);
        match serde_json::from_str(&response.body)? {
            Value::Array(items) => Ok(Fetched { items, signal }),
            other => Err(ScaffoldError::UnexpectedBody(format!(
                "expected a JSON array from {url}, got {}",
                json_kind(&other)
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Start a creation attempt. Nothing is sent until it is resolved.
    pub fn create(&self) -> CreateAttempt<Pending> {
        let attempt = CreateAttempt::new(Arc::new(self.clone()));
        tracing::debug!(scaffold = %self.name(), attempt_id = %attempt.id, "Create attempt opened");
        attempt
    }

    async fn post(&self, payload: &Value) -> Result<Value> {
        let response = self
            .shared
            .http
            .execute(&HttpRequest::post(self.shared.model.url(), payload.to_string()))
            .await?
            .error_for_status()?;
        Ok(serde_json::from_str(&response.body)?)
    }

    fn next_token(&self) -> u64 {
        self.shared.tokens.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl<H: HttpClient> Committer for Scaffold<H> {
    fn commit(
        &self,
        runtime: &Handle,
        id: AttemptId,
        payload: Value,
        events: broadcast::Sender<AttemptEvent>,
    ) -> oneshot::Receiver<Result<Value>> {
        let token = self.next_token();
        self.shared
            .state
            .send_modify(|state| state.in_flight.begin_save(token));

        let (tx, rx) = oneshot::channel();
        let scaffold = self.clone();
        let span = tracing::debug_span!("create", scaffold = %self.name(), attempt_id = %id);

        runtime.spawn(
            async move {
                let shared = scaffold.shared.clone();
                let guard = scopeguard::guard(token, move |token| {
                    shared.state.send_modify(|state| {
                        state.in_flight.end_save(token);
                    });
                });

                let result = scaffold.post(&payload).await;
                let token = ScopeGuard::into_inner(guard);

                let event = match &result {
                    Ok(record) => {
                        let appended = record.clone();
                        scaffold.shared.state.send_modify(|state| {
                            state.in_flight.end_save(token);
                            state.items.push(appended);
                        });
                        tracing::info!("Record created");
                        AttemptEvent::Committed(record.clone())
                    }
                    Err(e) => {
                        scaffold.shared.state.send_modify(|state| {
                            state.in_flight.end_save(token);
                        });
                        tracing::warn!(error = %e, "Create failed");
                        AttemptEvent::Failed(e.to_string())
                    }
                };

                let _ = events.send(event);
                let _ = tx.send(result);
            }
            .instrument(span),
        );

        rx
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
