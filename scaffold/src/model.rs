//! Named remote resources.
//!
//! A [`Model`] is a base URL plus a default query. Models are immutable once
//! defined; scaffolds hold them through `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, ScaffoldError};
use crate::query::Query;

/// Definition of a model as given to [`ModelRegistry::define`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    /// Base endpoint of the resource collection
    pub url: String,
    /// Default query sent with every fetch
    #[serde(default)]
    pub query: Query,
}

impl ModelDefinition {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Query::new(),
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }
}

/// A resolved model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    url: String,
    defaults: Query,
}

impl Model {
    pub fn new(name: impl Into<String>, definition: ModelDefinition) -> Self {
        Self {
            name: name.into(),
            url: definition.url,
            defaults: definition.query,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn defaults(&self) -> &Query {
        &self.defaults
    }
}

/// Either a model name to look up, or an already resolved model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRef {
    Name(String),
    Resolved(Arc<Model>),
}

impl ModelRef {
    pub fn resolve(&self, registry: &ModelRegistry) -> Result<Arc<Model>> {
        match self {
            ModelRef::Name(name) => registry.resolve(name),
            ModelRef::Resolved(model) => Ok(model.clone()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ModelRef::Name(name) => name,
            ModelRef::Resolved(model) => model.name(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        ModelRef::Name(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        ModelRef::Name(name)
    }
}

impl From<Arc<Model>> for ModelRef {
    fn from(model: Arc<Model>) -> Self {
        ModelRef::Resolved(model)
    }
}

// Configuration files can only name models.
impl Serialize for ModelRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ModelRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(ModelRef::Name)
    }
}

/// Registry of models by name.
///
/// # Example
/// ```ignore
/// let mut registry = ModelRegistry::new();
/// registry
///     .define("Dogs", ModelDefinition::new("http://api/dogs"))
///     .define("Cats", ModelDefinition::new("http://api/cats"));
/// let dogs = registry.resolve("Dogs")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a model. Redefining a name affects later resolutions only.
    pub fn define(&mut self, name: impl Into<String>, definition: ModelDefinition) -> &mut Self {
        let name = name.into();
        let model = Arc::new(Model::new(name.clone(), definition));
        if self.models.insert(name.clone(), model).is_some() {
            tracing::warn!(model = %name, "Model redefined");
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| ScaffoldError::ModelNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}
