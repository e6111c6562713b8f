#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use scaffold::{
    HttpResponse, MockHttpClient, ModelDefinition, ModelRegistry, Scaffold, ScaffoldOptions,
    ScaffoldProvider,
};
use serde_json::{json, Value};

pub const DOGS_URL: &str = "http://api/dogs";

pub fn all_dogs() -> Value {
    json!([
        {"id": 1, "name": "Rex", "breed": "boxer"},
        {"id": 2, "name": "Fido", "breed": "beagle"},
        {"id": 3, "name": "Max", "breed": "boxer"},
    ])
}

pub fn boxers() -> Value {
    json!([
        {"id": 1, "name": "Rex", "breed": "boxer"},
        {"id": 3, "name": "Max", "breed": "boxer"},
    ])
}

pub fn one_dog() -> Value {
    json!({"name": "Bella", "breed": "poodle"})
}

pub fn ok(body: &Value) -> scaffold::Result<HttpResponse> {
    Ok(HttpResponse::json(200, body))
}

pub fn models() -> ModelRegistry {
    let mut models = ModelRegistry::new();
    models
        .define("Dogs", ModelDefinition::new(DOGS_URL))
        .define("Cats", ModelDefinition::new("http://api/cats"));
    models
}

pub fn provider() -> (ScaffoldProvider<MockHttpClient>, MockHttpClient) {
    let http = MockHttpClient::new();
    (ScaffoldProvider::new(models(), Arc::new(http.clone())), http)
}

/// Register `options` under "Dogs" and resolve it.
pub fn dogs(
    options: ScaffoldOptions,
) -> (Scaffold<MockHttpClient>, MockHttpClient, ScaffoldProvider<MockHttpClient>) {
    let (mut provider, http) = provider();
    provider.register("Dogs", options);
    let scaffold = provider.resolve("Dogs").expect("Dogs scaffold resolves");
    (scaffold, http, provider)
}

/// URLs of all requests recorded so far, as "METHOD url".
pub fn requests(http: &MockHttpClient) -> Vec<String> {
    http.get_calls().iter().map(|c| c.key()).collect()
}

/// Wait until the mock has seen `count` calls.
pub async fn wait_for_calls(http: &MockHttpClient, count: usize) {
    for _ in 0..500 {
        if http.call_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "expected {count} calls, saw {}: {:?}",
        http.call_count(),
        requests(http)
    );
}
