mod common;

use std::sync::Arc;

use common::*;
use figment::Jail;
use scaffold::{Config, MockHttpClient, ModelDefinition, Query, ScaffoldError, ScaffoldOptions};
use serde_json::json;

fn load(yaml: &str) -> Config {
    let mut loaded = None;
    Jail::expect_with(|jail| {
        jail.create_file("scaffold.yaml", yaml)?;
        loaded = Some(Config::load_file("scaffold.yaml")?);
        Ok(())
    });
    loaded.expect("config loaded")
}

#[tokio::test]
async fn test_configured_scaffolds_fetch_their_models() {
    let config = load(
        r#"
models:
  Dogs:
    url: http://api/dogs
scaffolds:
  Dogs:
    paginate: { limit: 5 }
  Boxers:
    model: Dogs
    query: { breed: boxer }
"#,
    );
    let http = MockHttpClient::new();
    let provider = config.provider(Arc::new(http.clone()));
    http.add_response("GET http://api/dogs?limit=5&page=1", ok(&all_dogs()));
    http.add_response("GET http://api/dogs?breed=boxer", ok(&boxers()));

    let dogs = provider.resolve("Dogs").unwrap();
    let boxers_scaffold = provider.resolve("Boxers").unwrap();
    dogs.ready().await.unwrap();
    boxers_scaffold.ready().await.unwrap();

    assert_eq!(json!(dogs.items()), all_dogs());
    assert_eq!(json!(boxers_scaffold.items()), boxers());
    assert!(Arc::ptr_eq(dogs.model(), boxers_scaffold.model()));
}

#[tokio::test]
async fn test_scaffolds_are_independent() {
    let (mut provider, http) = provider();
    provider
        .register("Dogs", ScaffoldOptions::new())
        .register(
            "Boxers",
            ScaffoldOptions::new()
                .model("Dogs")
                .query(Query::new().with("breed", "boxer")),
        );
    http.add_response("GET http://api/dogs", ok(&all_dogs()));
    http.add_response("GET http://api/dogs?breed=boxer", ok(&boxers()));

    let dogs = provider.resolve("Dogs").unwrap();
    let boxers_scaffold = provider.resolve("Boxers").unwrap();
    dogs.ready().await.unwrap();
    boxers_scaffold.ready().await.unwrap();

    dogs.update_query(|q| {
        q.set("breed", "beagle");
    });
    assert_eq!(boxers_scaffold.query(), Query::new().with("breed", "boxer"));
    assert_eq!(json!(boxers_scaffold.items()), boxers());
}

#[tokio::test]
async fn test_redefined_model_applies_to_new_instances_only() {
    let (mut provider, http) = provider();
    provider.register("Dogs", ScaffoldOptions::new());
    http.add_response("GET http://api/dogs", ok(&all_dogs()));
    http.add_response("GET http://api/v2/dogs", ok(&json!([])));

    let before = provider.resolve("Dogs").unwrap();
    before.ready().await.unwrap();

    provider
        .models_mut()
        .define("Dogs", ModelDefinition::new("http://api/v2/dogs"));
    assert_eq!(before.model().url(), "http://api/dogs");

    provider.evict("Dogs");
    let after = provider.resolve("Dogs").unwrap();
    after.ready().await.unwrap();

    assert_eq!(after.model().url(), "http://api/v2/dogs");
    assert_eq!(
        requests(&http),
        vec!["GET http://api/dogs", "GET http://api/v2/dogs"]
    );
}

#[tokio::test]
async fn test_resolution_errors_are_synchronous() {
    let (mut provider, http) = provider();
    provider.register("Birds", ScaffoldOptions::new());

    assert!(matches!(
        provider.resolve("Fish"),
        Err(ScaffoldError::ScaffoldNotRegistered(_))
    ));
    assert!(matches!(
        provider.resolve("Birds"),
        Err(ScaffoldError::ModelNotFound(_))
    ));
    assert_eq!(http.call_count(), 0);
}
