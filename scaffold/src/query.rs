//! Query parameters and URL composition.
//!
//! A request URL is built from three layers: the model's default query, the
//! scaffold's own query, and the pagination parameters. Parameter order is part
//! of the wire contract, so `Query` keeps insertion order and `compose` places
//! parameters as: base keys not overridden, explicit keys, `limit`, `page`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::pagination::PageParams;

/// A scalar query value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

/// An insertion-ordered mapping of parameter names to scalar values.
///
/// Setting an existing key replaces its value in place; the key keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    entries: IndexMap<String, Scalar>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable form of [`Query::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.get(key)
    }

    /// Remove `key`; the remaining keys keep their order.
    pub fn remove(&mut self, key: &str) -> Option<Scalar> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (k, v) in iter {
            query.set(k, v);
        }
        query
    }
}

/// Output of [`compose`]: the request URL and the parameters it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// Merge the base query, the explicit query and pagination into one request.
///
/// Explicit keys override base keys of the same name. With no parameters the
/// base URL is returned untouched; otherwise the encoded pairs are appended
/// after `?` (or `&` if the base URL already carries a query string).
pub fn compose(
    base_url: &str,
    base: &Query,
    explicit: &Query,
    pagination: Option<&PageParams>,
) -> ComposedRequest {
    let mut params: Vec<(String, String)> = base
        .iter()
        .filter(|(k, _)| !explicit.contains_key(k))
        .chain(explicit.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if let Some(page) = pagination {
        if let Some(limit) = page.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params.push(("page".to_string(), page.page.to_string()));
    }

    let url = if params.is_empty() {
        base_url.to_string()
    } else {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        let separator = if base_url.contains('?') { '&' } else { '?' };
        format!("{base_url}{separator}{encoded}")
    };

    ComposedRequest { url, params }
}
