use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consulta_cache::ResultCache;
use consulta_core::{CacheKey, DispatchStatus, Intent};
use consulta_dispatch::{
    DispatchConfig, Dispatcher, Handler, HandlerContext, HandlerError, HandlerRegistry,
};
use consulta_handlers::{offline_registry, OfflineHandler};
use consulta_observability::{AppMetrics, MemoryActivitySink};
use tokio::time::Instant;

/// Sleeps for twice its deadline and ignores cancellation.
#[derive(Default)]
struct Stubborn {
    calls: AtomicUsize,
}

#[async_trait]
impl Handler for Stubborn {
    fn name(&self) -> &str {
        "stubborn"
    }

    async fn invoke(&self, _query: &str, ctx: HandlerContext) -> Result<String, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(ctx.deadline * 2).await;
        Ok("too late".to_string())
    }
}

struct Broken;

#[async_trait]
impl Handler for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn invoke(&self, _query: &str, _ctx: HandlerContext) -> Result<String, HandlerError> {
        Err(HandlerError::Upstream {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

fn mixed_registry(weather: Arc<dyn Handler>) -> HandlerRegistry {
    HandlerRegistry::builder()
        .register(Intent::Research, Arc::new(OfflineHandler))
        .register(Intent::Chart, Arc::new(Broken))
        .register(Intent::Weather, weather)
        .build()
        .expect("every intent registered")
}

fn dispatcher_with(registry: HandlerRegistry, config: DispatchConfig) -> Dispatcher {
    Dispatcher::new(
        registry,
        ResultCache::new(config.cache_ttl),
        config,
        AppMetrics::shared(),
    )
    .expect("valid configuration")
}

#[tokio::test(start_paused = true)]
async fn stubborn_handler_is_abandoned_at_deadline_plus_grace() {
    let stubborn = Arc::new(Stubborn::default());
    let sink = Arc::new(MemoryActivitySink::new());
    let dispatcher = dispatcher_with(mixed_registry(stubborn.clone()), DispatchConfig::default())
        .with_activity_sink(sink.clone());

    let started = Instant::now();
    let outcome = dispatcher.dispatch("Previsão de chuva em Manaus").await;
    let waited = started.elapsed();

    assert_eq!(outcome.status, DispatchStatus::TimedOut);
    assert_eq!(outcome.handler_used, Some(Intent::Weather));
    assert!(!outcome.success);
    assert!(outcome.content.is_none());
    assert!(waited >= Duration::from_secs(35) && waited < Duration::from_secs(36));
    assert!(dispatcher.cache().is_empty());
    assert_eq!(
        sink.actions(),
        vec!["query_classified", "invocation_started", "timed_out"]
    );

    // the abandoned task must not write anything once it wakes up
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(dispatcher.cache().is_empty());

    let retry = dispatcher.dispatch("Previsão de chuva em Manaus").await;
    assert_eq!(retry.status, DispatchStatus::TimedOut);
    assert_eq!(stubborn.calls.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.metrics().snapshot().timed_out_total, 2);
}

#[tokio::test]
async fn routing_follows_the_classified_intent() {
    let dispatcher = dispatcher_with(
        mixed_registry(Arc::new(OfflineHandler)),
        DispatchConfig::default(),
    );

    let chart = dispatcher.dispatch("Gráfico do PIB").await;
    assert_eq!(chart.status, DispatchStatus::Failed);
    assert_eq!(chart.handler_used, Some(Intent::Chart));
    assert_eq!(
        chart.error_message.as_deref(),
        Some("Could not fully process query 'Gráfico do PIB'. Error: upstream returned status 503: service unavailable...")
    );

    let research = dispatcher.dispatch("xyz abc").await;
    assert_eq!(research.status, DispatchStatus::Completed);
    assert_eq!(research.handler_used, Some(Intent::Research));
    let classification = research.classification.expect("classification kept");
    assert_eq!(classification.confidence, 0.0);

    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.failed_total, 1);
    assert_eq!(snapshot.completed_total, 1);
    assert_eq!(dispatcher.cache().size(), 1);
}

#[tokio::test(start_paused = true)]
async fn cached_answers_expire_after_ttl() {
    let config = DispatchConfig {
        cache_ttl: Duration::from_secs(60),
        ..DispatchConfig::default()
    };
    let dispatcher = dispatcher_with(offline_registry(), config);

    let first = dispatcher.dispatch("  PIB   São Paulo ").await;
    assert!(!first.cached);

    tokio::time::advance(Duration::from_secs(59)).await;
    let hit = dispatcher.dispatch("pib são paulo").await;
    assert!(hit.cached);
    assert_eq!(hit.id, first.id);
    assert_eq!(hit.content, first.content);

    tokio::time::advance(Duration::from_secs(1)).await;
    let miss = dispatcher.dispatch("pib são paulo").await;
    assert!(!miss.cached);
    assert_ne!(miss.id, first.id);
}

#[test]
fn normalized_queries_share_a_cache_key() {
    assert_eq!(
        CacheKey::system("  PIB   São Paulo "),
        CacheKey::system("pib são paulo")
    );
    assert_ne!(
        CacheKey::system("pib são paulo"),
        CacheKey::system("pib rio de janeiro")
    );
}

#[tokio::test]
async fn concurrent_callers_share_one_dispatcher() {
    let dispatcher = Arc::new(dispatcher_with(offline_registry(), DispatchConfig::default()));

    let tasks: Vec<_> = (0..16)
        .map(|index| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                let city = if index % 2 == 0 { "recife" } else { "curitiba" };
                dispatcher.dispatch(&format!("economia de {city} {index}")).await
            })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.expect("dispatch task joins");
        assert!(outcome.success);
    }

    assert_eq!(dispatcher.cache().size(), 16);
    assert_eq!(dispatcher.metrics().snapshot().requests_total, 16);
}
