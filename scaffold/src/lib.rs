//! Client-side data fetching and state synchronization for named REST models.
//!
//! This crate provides scaffolds that:
//! - Fetch a model's collection with a composed query and page parameters
//! - Expose `loading`/`saving` flags and the fetched items for view binding
//! - Track page size, current page and known pages from response headers
//! - Separate the intent to create a record from committing it
//!
//! # Example
//! ```ignore
//! use scaffold::{ModelDefinition, ModelRegistry, ReqwestHttpClient, ScaffoldOptions, ScaffoldProvider};
//!
//! let mut models = ModelRegistry::new();
//! models.define("Dogs", ModelDefinition::new("http://api/dogs"));
//!
//! let mut provider = ScaffoldProvider::new(models, Arc::new(ReqwestHttpClient::new()));
//! provider.register("Dogs", ScaffoldOptions::new().paginate(true));
//!
//! let dogs = provider.resolve("Dogs")?;
//! dogs.ready().await?;
//! dogs.page(2).await?;
//!
//! let attempt = dogs.create();
//! let committed = attempt.resolve(json!({"name": "Rex"}))?.complete().await;
//! ```

pub mod config;
pub mod create;
pub mod error;
pub mod http;
pub mod model;
pub mod pagination;
pub mod provider;
pub mod query;
pub mod scaffold;
pub mod telemetry;
pub mod ui;

// Re-export commonly used types
pub use config::{Args, Config, HttpConfig};
pub use create::{AttemptEvent, AttemptStatus, CreateAttempt};
pub use error::{Result, ScaffoldError};
pub use http::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use model::{Model, ModelDefinition, ModelRef, ModelRegistry};
pub use pagination::{PageSignal, Paginate, PaginationState};
pub use provider::{ScaffoldOptions, ScaffoldProvider};
pub use query::{compose, ComposedRequest, Query, Scalar};
pub use scaffold::{Scaffold, ScaffoldState};
pub use ui::UiState;
