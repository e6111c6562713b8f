//! Registration and lazy resolution of named scaffolds.
//!
//! The provider is owned by the application root. It maps scaffold names to
//! their options and creates each scaffold the first time it is resolved;
//! later resolutions return the same instance until it is evicted or the
//! provider is reset.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScaffoldError};
use crate::http::HttpClient;
use crate::model::{Model, ModelRef, ModelRegistry};
use crate::pagination::Paginate;
use crate::query::Query;
use crate::scaffold::Scaffold;

/// Registration options for a scaffold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScaffoldOptions {
    /// Model to bind to; defaults to the scaffold's own name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    /// Initial scaffold-level query
    pub query: Query,
    /// `true`, `false` or `{ limit: N }`
    pub paginate: Paginate,
}

impl ScaffoldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<ModelRef>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn paginate(mut self, paginate: impl Into<Paginate>) -> Self {
        self.paginate = paginate.into();
        self
    }

    /// The model reference, falling back to the registration name.
    pub fn model_ref(&self, name: &str) -> ModelRef {
        self.model
            .clone()
            .unwrap_or_else(|| ModelRef::Name(name.to_string()))
    }
}

/// Registry of scaffold definitions and their live instances.
///
/// # Example
/// ```ignore
/// let mut provider = ScaffoldProvider::new(models, Arc::new(ReqwestHttpClient::new()));
/// provider
///     .register("Dogs", ScaffoldOptions::new())
///     .register("Boxers", ScaffoldOptions::new().model("Dogs").query(boxers));
///
/// let dogs = provider.resolve("Dogs")?;
/// dogs.ready().await?;
/// ```
pub struct ScaffoldProvider<H: HttpClient> {
    models: ModelRegistry,
    http: Arc<H>,
    definitions: HashMap<String, ScaffoldOptions>,
    instances: Mutex<HashMap<String, Scaffold<H>>>,
}

impl<H: HttpClient> ScaffoldProvider<H> {
    pub fn new(models: ModelRegistry, http: Arc<H>) -> Self {
        Self {
            models,
            http,
            definitions: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelRegistry {
        &mut self.models
    }

    /// Register (or re-register) a scaffold definition.
    ///
    /// An already created instance keeps its original options until evicted.
    pub fn register(&mut self, name: impl Into<String>, options: ScaffoldOptions) -> &mut Self {
        let name = name.into();
        tracing::debug!(scaffold = %name, "Scaffold registered");
        self.definitions.insert(name, options);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn is_instantiated(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    /// Resolve the model a registered scaffold binds to, without creating it.
    pub fn model_for(&self, name: &str) -> Result<Arc<Model>> {
        let options = self
            .definitions
            .get(name)
            .ok_or_else(|| ScaffoldError::ScaffoldNotRegistered(name.to_string()))?;
        options.model_ref(name).resolve(&self.models)
    }

    /// Get the scaffold registered under `name`, creating it on first use.
    ///
    /// Creating a scaffold issues its first fetch in the background.
    ///
    /// # Errors
    /// - `ScaffoldNotRegistered` if no definition exists for `name`
    /// - `ModelNotFound` if the scaffold's model is not in the registry
    /// - `Runtime` if called outside a tokio runtime
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> Result<Scaffold<H>> {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(name) {
            return Ok(existing.clone());
        }

        let options = self
            .definitions
            .get(name)
            .ok_or_else(|| ScaffoldError::ScaffoldNotRegistered(name.to_string()))?;
        let model = options.model_ref(name).resolve(&self.models)?;

        let scaffold = Scaffold::spawn(
            name,
            model,
            options.query.clone(),
            options.paginate,
            self.http.clone(),
        )?;
        instances.insert(name.to_string(), scaffold.clone());

        tracing::info!(scaffold = %name, "Scaffold instantiated");
        Ok(scaffold)
    }

    /// Drop the live instance for `name`; the next resolve creates a new one.
    pub fn evict(&self, name: &str) -> Option<Scaffold<H>> {
        self.instances.lock().remove(name)
    }

    /// Drop every live instance. Definitions are kept.
    pub fn reset(&self) {
        let mut instances = self.instances.lock();
        tracing::debug!(count = instances.len(), "Resetting scaffold instances");
        instances.clear();
    }
}
