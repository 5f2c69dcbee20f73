//! Common test utilities: app builders, request helpers and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tours_service::api::rest::{routes::build_router, AppState};
use tours_service::domain::{DocumentStore, QuerySpec, Service};
use tours_service::infra::storage::InMemoryDocumentStore;
use tours_service::{Collection, Config, Document, Environment, StorageError};
use tower::ServiceExt;

/// Router plus direct access to its store
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryDocumentStore>,
}

pub fn config(environment: Environment) -> Config {
    Config {
        environment,
        ..Config::default()
    }
}

pub fn router_with_store(store: Arc<dyn DocumentStore>, environment: Environment) -> Router {
    build_router(AppState {
        service: Arc::new(Service::new(store)),
        config: Arc::new(config(environment)),
    })
}

pub fn test_app(environment: Environment) -> TestApp {
    let store = Arc::new(InMemoryDocumentStore::new().unwrap());
    TestApp {
        router: router_with_store(store.clone(), environment),
        store,
    }
}

/// Send one request and decode the JSON body (`Null` when empty)
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send_raw(router, request).await
}

pub async fn send_raw(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None).await
}

pub fn tour(name: &str, price: f64, duration: u32, rating: f64) -> Value {
    json!({
        "name": name,
        "duration": duration,
        "maxGroupSize": 10,
        "difficulty": if duration > 7 { "difficult" } else { "easy" },
        "price": price,
        "ratingsAverage": rating,
        "summary": format!("{name} summary"),
        "imageCover": "tour-cover.jpg"
    })
}

/// Five tours with distinct prices, durations and ratings
pub async fn seed_tours(app: &TestApp) -> Vec<String> {
    let fixtures = [
        ("The Forest Hiker", 397.0, 5, 4.7),
        ("The Sea Explorer", 497.0, 7, 4.8),
        ("The Snow Adventurer", 997.0, 4, 4.5),
        ("The City Wanderer", 1197.0, 9, 4.6),
        ("The Park Camper", 1497.0, 10, 4.9),
    ];
    let mut ids = Vec::new();
    for (name, price, duration, rating) in fixtures {
        let (status, body) = send(
            &app.router,
            Method::POST,
            "/api/v1/tours",
            Some(tour(name, price, duration, rating)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "seeding {name}: {body}");
        ids.push(body["data"]["tour"]["_id"].as_str().unwrap().to_string());
    }
    ids
}

pub fn names(body: &Value, key: &str) -> Vec<String> {
    body["data"][key]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect()
}

/// Store whose every operation fails with the given error
pub struct FailingStore {
    pub error: StorageError,
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn find(&self, _: Collection, _: &QuerySpec) -> Result<Vec<Document>, StorageError> {
        Err(self.error.clone())
    }

    async fn find_by_id(&self, _: Collection, _: &str) -> Result<Option<Document>, StorageError> {
        Err(self.error.clone())
    }

    async fn insert(&self, _: Collection, _: Document) -> Result<Document, StorageError> {
        Err(self.error.clone())
    }

    async fn update(
        &self,
        _: Collection,
        _: &str,
        _: Document,
    ) -> Result<Option<Document>, StorageError> {
        Err(self.error.clone())
    }

    async fn delete(&self, _: Collection, _: &str) -> Result<Option<Document>, StorageError> {
        Err(self.error.clone())
    }
}

pub fn print_test_header(test_name: &str, purpose: &str) {
    println!("\n🧪 TEST: {}", test_name);
    println!("📋 PURPOSE: {}", purpose);
}
