use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use consulta_cache::ResultCache;
use consulta_core::DispatchStatus;
use consulta_dispatch::{DispatchConfig, Dispatcher};
use consulta_handlers::{remote_registry, RemoteConfig};
use consulta_observability::AppMetrics;
use serde_json::{json, Value};

async fn spawn_stub(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn dispatcher_for(addr: SocketAddr, config: DispatchConfig) -> Dispatcher {
    let remote = RemoteConfig {
        endpoint: format!("http://{addr}"),
        ..RemoteConfig::new("test-token")
    };
    Dispatcher::new(
        remote_registry(remote).expect("registry builds"),
        ResultCache::new(config.cache_ttl),
        config,
        AppMetrics::shared(),
    )
    .expect("valid configuration")
}

async fn echo_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer test-token");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad token" })));
    }

    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let role = if system.contains("meteorológicas") {
        "weather"
    } else if system.contains("visualização") {
        "chart"
    } else {
        "research"
    };
    let answer = format!("{role}: {}", body["messages"][1]["content"].as_str().unwrap_or_default());

    (
        StatusCode::OK,
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": answer } }] })),
    )
}

#[tokio::test]
async fn completion_content_becomes_the_answer() {
    let addr = spawn_stub(Router::new().route("/chat/completions", post(echo_completion))).await;
    let dispatcher = dispatcher_for(addr, DispatchConfig::default());

    let outcome = dispatcher.dispatch("Qual a temperatura em Brasília?").await;

    assert_eq!(outcome.status, DispatchStatus::Completed);
    assert_eq!(
        outcome.content.as_deref(),
        Some("weather: Qual a temperatura em Brasília?")
    );
    assert_eq!(dispatcher.cache().size(), 1);
}

#[tokio::test]
async fn upstream_errors_fail_the_dispatch() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
    );
    let addr = spawn_stub(app).await;
    let dispatcher = dispatcher_for(addr, DispatchConfig::default());

    let outcome = dispatcher.dispatch("pib de curitiba").await;

    assert_eq!(outcome.status, DispatchStatus::Failed);
    assert!(outcome
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("upstream returned status 500: model overloaded")));
    assert!(dispatcher.cache().is_empty());
}

#[tokio::test]
async fn empty_completion_is_a_failure() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({ "choices": [{ "message": { "content": "  " } }] })) }),
    );
    let addr = spawn_stub(app).await;
    let dispatcher = dispatcher_for(addr, DispatchConfig::default());

    let outcome = dispatcher.dispatch("Gráfico do PIB").await;

    assert_eq!(outcome.status, DispatchStatus::Failed);
    assert!(outcome
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("completion output text missing")));
}

#[tokio::test]
async fn slow_endpoint_is_cancelled_at_the_deadline() {
    let app = Router::new().route(
        "/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "choices": [{ "message": { "content": "late" } }] }))
        }),
    );
    let addr = spawn_stub(app).await;
    let config = DispatchConfig {
        deadline: Duration::from_millis(200),
        grace: Duration::from_millis(200),
        ..DispatchConfig::default()
    };
    let dispatcher = dispatcher_for(addr, config);

    let started = std::time::Instant::now();
    let outcome = dispatcher.dispatch("clima em recife").await;

    assert_eq!(outcome.status, DispatchStatus::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(dispatcher.cache().is_empty());
}
