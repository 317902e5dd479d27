use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use consulta_api::{build_router, ApiState};
use consulta_dispatch::DispatchConfig;
use consulta_handlers::offline_registry;
use serde_json::{json, Value};
use tower::ServiceExt;

fn offline_app() -> Router {
    let state = ApiState::new(offline_registry(), DispatchConfig::default(), false)
        .expect("state should build");
    build_router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_config_and_metrics() {
    let app = offline_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (_, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["config"]["deadline_secs"], 30.0);
    assert_eq!(body["config"]["cache_ttl_secs"], 1800);
    assert_eq!(body["remote_handlers"], false);
    assert_eq!(body["metrics"]["requests_total"], 0);
}

#[tokio::test]
async fn dispatch_returns_outcome_and_caches_it() {
    let app = offline_app();

    let (status, first) = send(
        &app,
        post_json("/v1/dispatch", json!({ "query": "Qual a temperatura em Brasília?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "completed");
    assert_eq!(first["success"], true);
    assert_eq!(first["handler_used"], "weather");
    assert_eq!(first["cached"], false);
    assert_eq!(first["classification"]["entities"], json!(["Brasília"]));

    let (_, second) = send(
        &app,
        post_json("/v1/dispatch", json!({ "query": "qual a temperatura em  brasília?" })),
    )
    .await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["content"], first["content"]);

    let (_, cache) = send(
        &app,
        Request::builder().uri("/v1/cache").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(cache["size"], 1);
    assert_eq!(cache["ttl_secs"], 1800);
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let app = offline_app();

    let (status, body) = send(&app, post_json("/v1/dispatch", json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_query");

    let (status, _) = send(&app, post_json("/v1/classify", json!({ "query": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn classify_does_not_dispatch() {
    let app = offline_app();

    let (status, body) = send(&app, post_json("/v1/classify", json!({ "query": "Gráfico do PIB" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "chart");
    assert_eq!(body["keywords"], json!(["pib"]));

    let (_, cache) = send(
        &app,
        Request::builder().uri("/v1/cache").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(cache["size"], 0);
}

#[tokio::test]
async fn cache_can_be_cleared_over_http() {
    let app = offline_app();
    send(&app, post_json("/v1/dispatch", json!({ "query": "pib recife" }))).await;
    send(&app, post_json("/v1/dispatch", json!({ "query": "pib manaus" }))).await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/v1/cache")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 2);

    let (_, cache) = send(
        &app,
        Request::builder().uri("/v1/cache").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(cache["size"], 0);
}
