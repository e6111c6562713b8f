//! Configuration management.
//!
//! Models and scaffolds can be declared in a YAML file instead of in code. The
//! file path defaults to `scaffold.yaml` and can be given with `-f` or the
//! `SCAFFOLD_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration
//! 2. **Environment variables** - Variables prefixed with `SCAFFOLD_` override YAML values
//!
//! Nested values use double underscores, e.g. `SCAFFOLD_HTTP__TIMEOUT=5s`.
//!
//! ## Example
//!
//! ```yaml
//! http:
//!   timeout: 30s
//! models:
//!   Dogs:
//!     url: http://api/dogs
//! scaffolds:
//!   Dogs:
//!     paginate: { limit: 5 }
//!   Boxers:
//!     model: Dogs
//!     query: { breed: boxer }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScaffoldError};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::model::{ModelDefinition, ModelRef, ModelRegistry};
use crate::pagination::Paginate;
use crate::provider::{ScaffoldOptions, ScaffoldProvider};

/// Command line arguments for the `scaffold` binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SCAFFOLD_CONFIG", default_value = "scaffold.yaml")]
    pub config: String,

    /// Name of the scaffold to fetch
    pub scaffold: String,

    /// Page to fetch (paginated scaffolds only)
    #[arg(long)]
    pub page: Option<u32>,

    /// Extra query parameters as key=value, applied over the configured query
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP transport settings
    pub http: HttpConfig,
    /// Models by name
    pub models: HashMap<String, ModelDefinition>,
    /// Scaffolds by name
    pub scaffolds: HashMap<String, ScaffoldOptions>,
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// User-Agent header sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn client(&self) -> Result<ReqwestHttpClient> {
        ReqwestHttpClient::with_options(self.timeout, self.user_agent.as_deref())
    }
}

impl Config {
    pub fn load(args: &Args) -> std::result::Result<Self, figment::Error> {
        Self::load_file(&args.config)
    }

    pub fn load_file(path: &str) -> std::result::Result<Self, figment::Error> {
        let config: Self = Self::figment(path).extract()?;
        config
            .validate()
            .map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            // SCAFFOLD_CONFIG names the file itself
            .merge(Env::prefixed("SCAFFOLD_").ignore(&["config"]).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout.is_zero() {
            return Err(ScaffoldError::InvalidConfig(
                "http.timeout must be greater than zero".to_string(),
            ));
        }

        for (name, model) in &self.models {
            Url::parse(&model.url).map_err(|e| {
                ScaffoldError::InvalidConfig(format!(
                    "model {name} has an invalid url '{}': {e}",
                    model.url
                ))
            })?;
        }

        for (name, options) in &self.scaffolds {
            if let Paginate::Sized { limit: 0 } = options.paginate {
                return Err(ScaffoldError::InvalidConfig(format!(
                    "scaffold {name} has a page limit of 0"
                )));
            }
            let model = options.model_ref(name);
            if let ModelRef::Name(model_name) = &model {
                if !self.models.contains_key(model_name) {
                    return Err(ScaffoldError::InvalidConfig(format!(
                        "scaffold {name} refers to unknown model {model_name}"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn model_registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for (name, definition) in &self.models {
            registry.define(name.clone(), definition.clone());
        }
        registry
    }

    /// Build a provider with every configured model and scaffold registered.
    pub fn provider<H: HttpClient>(&self, http: Arc<H>) -> ScaffoldProvider<H> {
        let mut provider = ScaffoldProvider::new(self.model_registry(), http);
        for (name, options) in &self.scaffolds {
            provider.register(name.clone(), options.clone());
        }
        provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Query, Scalar};
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            scaffold: "Dogs".to_string(),
            page: None,
            query: Vec::new(),
        }
    }

    #[test]
    fn test_load_models_and_scaffolds() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
http:
  timeout: 5s
  user_agent: scaffold-test
models:
  Dogs:
    url: http://api/dogs
    query:
      sort: name
  Cats:
    url: http://api/cats
scaffolds:
  Dogs:
    paginate: true
  Boxers:
    model: Dogs
    query:
      breed: boxer
    paginate:
      limit: 5
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.http.timeout, Duration::from_secs(5));
            assert_eq!(config.http.user_agent.as_deref(), Some("scaffold-test"));
            assert_eq!(config.models.len(), 2);
            assert_eq!(
                config.models["Dogs"].query.get("sort"),
                Some(&Scalar::Str("name".into()))
            );

            let boxers = &config.scaffolds["Boxers"];
            assert_eq!(boxers.model_ref("Boxers"), ModelRef::Name("Dogs".into()));
            assert_eq!(boxers.paginate, Paginate::limit(5));
            assert_eq!(boxers.query, Query::new().with("breed", "boxer"));

            assert_eq!(config.scaffolds["Dogs"].paginate, Paginate::Enabled(true));

            let registry = config.model_registry();
            assert_eq!(registry.resolve("Cats").unwrap().url(), "http://api/cats");

            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;
            assert_eq!(config.http.timeout, Duration::from_secs(30));
            assert!(config.models.is_empty());
            assert!(config.scaffolds.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
http:
  timeout: 5s
"#,
            )?;
            jail.set_env("SCAFFOLD_HTTP__TIMEOUT", "250ms");
            jail.set_env("SCAFFOLD_HTTP__USER_AGENT", "from-env");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.http.timeout, Duration::from_millis(250));
            assert_eq!(config.http.user_agent.as_deref(), Some("from-env"));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_model_reference_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
models:
  Dogs:
    url: http://api/dogs
scaffolds:
  Cats: {}
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("unknown model Cats"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_url_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
models:
  Dogs:
    url: not a url
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("invalid url"));
            Ok(())
        });
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut config = Config::default();
        config
            .models
            .insert("Dogs".into(), ModelDefinition::new("http://api/dogs"));
        config.scaffolds.insert(
            "Dogs".into(),
            ScaffoldOptions::new().paginate(Paginate::limit(0)),
        );
        assert!(matches!(
            config.validate(),
            Err(ScaffoldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
models:
  Dogs:
    url: http://api/dogs
    urls: http://api/dogs
"#,
            )?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "scaffold",
            "-f",
            "custom.yaml",
            "Dogs",
            "--page",
            "3",
            "--query",
            "breed=boxer",
            "--query",
            "age=2",
        ]);
        assert_eq!(args.config, "custom.yaml");
        assert_eq!(args.scaffold, "Dogs");
        assert_eq!(args.page, Some(3));
        assert_eq!(args.query, vec!["breed=boxer", "age=2"]);
    }
}
