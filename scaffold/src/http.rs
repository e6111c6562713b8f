//! HTTP client abstraction for making requests.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use crate::error::{Result, ScaffoldError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A request issued by a scaffold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Fully composed URL, query string included
    pub url: String,
    /// The request body as a JSON string (empty for GET)
    pub body: String,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            body: String::new(),
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lower-cased
    pub headers: HashMap<String, String>,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    /// A response with the given status and a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a `Status` error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScaffoldError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and makes the scaffold lifecycle testable without making real HTTP calls.
/// Implementations return every response they receive, whatever its status;
/// interpreting the status is up to the caller.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.execute(&HttpRequest::get("http://api/dogs")).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Execute an HTTP request.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request fails due to network issues
    /// - The request times out
    /// - The URL is invalid
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new reqwest-based HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a client with a per-request timeout and an optional user agent.
    pub fn with_options(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method: reqwest::Method = request.method.parse().map_err(|e| {
            tracing::error!(method = %request.method, error = %e, "Invalid HTTP method");
            anyhow::anyhow!("Invalid HTTP method '{}': {}", request.method, e)
        })?;

        let mut req = self
            .client
            .request(method, &request.url)
            .header("Accept", "application/json");

        if !request.body.is_empty() {
            req = req
                .header("Content-Type", "application/json")
                .body(request.body.clone());
            tracing::trace!(body_len = request.body.len(), "Added request body");
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(url = %request.url, error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

enum MockReply {
    Ready(Result<HttpResponse>),
    Deferred(oneshot::Receiver<Result<HttpResponse>>),
}

/// Mock HTTP client for testing.
///
/// Allows configuring predetermined responses for specific requests without
/// making actual HTTP calls. Deferred responses are held until the test sends
/// them, which makes in-flight state observable.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "GET http://api/dogs",
///     Ok(HttpResponse::json(200, &json!([{"name": "Rex"}]))),
/// );
/// let release = mock.add_deferred_response("POST http://api/dogs");
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub method: String,
    pub url: String,
    pub body: String,
}

impl MockCall {
    /// The "{method} {url}" key this call was matched against.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predetermined response for a specific method and URL.
    ///
    /// The key is formatted as "{method} {url}". Multiple responses can be
    /// added for the same key - they will be returned in FIFO order.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(MockReply::Ready(response));
    }

    /// Queue a response that is only delivered once the returned sender fires.
    ///
    /// Dropping the sender fails the matching call.
    pub fn add_deferred_response(&self, key: &str) -> oneshot::Sender<Result<HttpResponse>> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(MockReply::Deferred(rx));
        tx
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Clear all recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.calls.lock().push(MockCall {
            method: request.method.clone(),
            url: request.url.clone(),
            body: request.body.clone(),
        });

        let key = format!("{} {}", request.method, request.url);
        let reply = self
            .responses
            .lock()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        match reply {
            Some(MockReply::Ready(response)) => response,
            Some(MockReply::Deferred(rx)) => rx.await.unwrap_or_else(|_| {
                Err(anyhow::anyhow!("Deferred mock response for {} was dropped", key).into())
            }),
            None => Err(anyhow::anyhow!("No mock response configured for {}", key).into()),
        }
    }
}
