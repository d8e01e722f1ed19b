// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HttpSchemaRegistry against an in-process Confluent-style REST server.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use tributary_schema::{
    parse_schema, HttpSchemaRegistry, InMemorySchemaRegistry, RegistryConfig, Schema, SchemaRegistry,
};

const ORDER: &str = r#"{"type":"record","name":"Order","namespace":"shop","fields":[{"name":"id","type":"long"},{"name":"note","type":["null","string"],"default":null}]}"#;

async fn register(
    State(registry): State<Arc<InMemorySchemaRegistry>>,
    Path(subject): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(text) = body.get("schema").and_then(|s| s.as_str()) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error_code": 42201, "message": "missing schema"})));
    };
    let schema = match Schema::parse_str(text) {
        Ok(schema) => schema,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error_code": 42201, "message": e.to_string()})),
            )
        }
    };
    match registry.register(&subject, &schema).await {
        Ok(id) => (StatusCode::OK, Json(json!({ "id": id }))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error_code": 50001, "message": e.to_string()}))),
    }
}

async fn schema_by_id(State(registry): State<Arc<InMemorySchemaRegistry>>, Path(id): Path<u32>) -> impl IntoResponse {
    match registry.get_by_id(id).await {
        Ok(schema) => (
            StatusCode::OK,
            Json(json!({ "schema": serde_json::to_string(&schema).unwrap() })),
        ),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error_code": 40403, "message": format!("Schema {id} not found")})),
        ),
    }
}

async fn spawn_registry() -> (String, Arc<InMemorySchemaRegistry>) {
    let registry = Arc::new(InMemorySchemaRegistry::new());
    let app = Router::new()
        .route("/subjects/{subject}/versions", post(register))
        .route("/schemas/ids/{id}", get(schema_by_id))
        .with_state(Arc::clone(&registry));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), registry)
}

/// A URL nothing listens on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn client(urls: Vec<String>) -> HttpSchemaRegistry {
    HttpSchemaRegistry::new(&RegistryConfig {
        urls,
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

#[tokio::test]
async fn test_register_and_fetch() {
    let (url, backing) = spawn_registry().await;
    let registry = client(vec![url]);
    let schema = parse_schema(ORDER).unwrap();

    let id = registry.register("shop.Order", &schema).await.unwrap();
    assert_eq!(registry.register("shop.Order", &schema).await.unwrap(), id);
    assert_eq!(backing.versions("shop.Order"), vec![id]);

    let fetched = registry.get_by_id(id).await.unwrap();
    assert_eq!(fetched, schema);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let (url, _backing) = spawn_registry().await;
    let registry = client(vec![url]);
    let error = registry.get_by_id(999).await.unwrap_err();
    assert!(error.is_not_found(), "unexpected error: {error}");
}

#[tokio::test]
async fn test_fails_over_to_next_url() {
    let (url, _backing) = spawn_registry().await;
    let registry = client(vec![dead_url().await, url]);
    let schema = parse_schema(ORDER).unwrap();
    let id = registry.register("shop.Order", &schema).await.unwrap();
    assert!(registry.get_by_id(id).await.is_ok());
}

#[tokio::test]
async fn test_all_urls_down_is_unavailable() {
    let registry = client(vec![dead_url().await, dead_url().await]);
    let error = registry.get_by_id(1).await.unwrap_err();
    assert!(error.is_unavailable());
    assert!(!error.is_not_found());
}
