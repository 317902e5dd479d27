mod config;
mod error;
mod handler;
mod registry;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use consulta_cache::ResultCache;
use consulta_core::{CacheKey, Classification, Classifier, DispatchOutcome, RuleClassifier};
use consulta_observability::{ActivityRecord, ActivitySink, AppMetrics, TracingActivitySink};
use futures::FutureExt;
use serde_json::json;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, info, instrument, warn};

pub use config::{
    DispatchConfig, DEFAULT_CACHE_TTL, DEFAULT_DEADLINE, DEFAULT_GRACE, DEFAULT_MAX_HANDLER_STEPS,
};
pub use error::{DispatchError, HandlerError};
pub use handler::{Handler, HandlerContext};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};

const ERROR_MESSAGE_LIMIT: usize = 100;

enum Execution {
    Completed(String),
    Failed(String),
    TimedOut,
}

#[derive(Clone)]
pub struct Dispatcher {
    classifier: Arc<dyn Classifier>,
    registry: Arc<HandlerRegistry>,
    cache: ResultCache,
    config: DispatchConfig,
    activity: Arc<dyn ActivitySink>,
    metrics: Arc<AppMetrics>,
}

impl Dispatcher {
    pub fn new(
        registry: HandlerRegistry,
        cache: ResultCache,
        config: DispatchConfig,
        metrics: Arc<AppMetrics>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        Ok(Self {
            classifier: Arc::new(RuleClassifier),
            registry: Arc::new(registry),
            cache,
            config,
            activity: Arc::new(TracingActivitySink),
            metrics,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_activity_sink(mut self, activity: Arc<dyn ActivitySink>) -> Self {
        self.activity = activity;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query)
    }

    /// Answers one query. Never fails: every path ends in an outcome, and the
    /// caller is never held longer than `deadline + grace`.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, query: &str) -> DispatchOutcome {
        let started = Instant::now();
        self.metrics.inc_request();

        let outcome = match AssertUnwindSafe(self.run(query)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => self.unexpected_failure(query, &panic_message(payload.as_ref()), started),
        };

        self.metrics.observe_latency(started.elapsed());
        outcome
    }

    async fn run(&self, query: &str) -> DispatchOutcome {
        let key = CacheKey::system(query);
        if let Some(cached) = self.cache.get(&key) {
            self.metrics.inc_cache_hit();
            info!(cache_key = %key, "served from cache");
            self.activity.record(ActivityRecord::new(
                "system",
                "cache_hit",
                json!({ "query": query, "cache_key": key.as_str() }),
            ));
            return cached.into_cached();
        }

        let started = Instant::now();
        let classification = self.classifier.classify(query);
        info!(
            intent = %classification.intent,
            confidence = classification.confidence,
            entities = ?classification.entities,
            "query classified"
        );
        self.activity.record(ActivityRecord::new(
            "system",
            "query_classified",
            json!({
                "intent": classification.intent,
                "confidence": classification.confidence,
                "entities": classification.entities,
                "keywords": classification.keywords,
            }),
        ));

        let handler = self.registry.resolve(classification.intent);
        self.activity.record(ActivityRecord::new(
            handler_component(&classification),
            "invocation_started",
            json!({
                "handler": handler.name(),
                "deadline_ms": millis(self.config.deadline),
            }),
        ));

        let execution = self.execute(handler, query, &classification).await;
        self.finalize(key, query, classification, execution, started)
    }

    async fn execute(
        &self,
        handler: Arc<dyn Handler>,
        query: &str,
        classification: &Classification,
    ) -> Execution {
        let cancel = CancellationToken::new();
        let ctx = HandlerContext {
            intent: classification.intent,
            classification: classification.clone(),
            deadline: self.config.deadline,
            max_steps: self.config.max_handler_steps,
            cancel: cancel.clone(),
        };

        // dropping the dispatch future cancels the token and aborts the task
        let _cancel_on_drop = cancel.clone().drop_guard();
        let owned_query = query.to_string();
        let mut task = AbortOnDropHandle::new(tokio::spawn(async move {
            handler.invoke(&owned_query, ctx).await
        }));

        let joined = match tokio::time::timeout(self.config.deadline, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                warn!(
                    deadline_ms = millis(self.config.deadline),
                    grace_ms = millis(self.config.grace),
                    "handler deadline reached, waiting out grace margin"
                );
                // anything the handler produces after the deadline is discarded
                if tokio::time::timeout(self.config.grace, &mut task).await.is_err() {
                    task.abort();
                }
                return Execution::TimedOut;
            }
        };

        match joined {
            Ok(Ok(content)) => Execution::Completed(content),
            Ok(Err(HandlerError::Cancelled)) if cancel.is_cancelled() => Execution::TimedOut,
            Ok(Err(err)) => Execution::Failed(err.to_string()),
            Err(join_error) => Execution::Failed(describe_join_error(join_error)),
        }
    }

    fn finalize(
        &self,
        key: CacheKey,
        query: &str,
        classification: Classification,
        execution: Execution,
        started: Instant,
    ) -> DispatchOutcome {
        let elapsed = started.elapsed();
        let duration_ms = millis(elapsed);
        let component = handler_component(&classification);

        match execution {
            Execution::Completed(content) => {
                self.metrics.inc_completed();
                let outcome = DispatchOutcome::completed(query, classification, content, duration_ms);

                let cacheable = elapsed < self.config.deadline;
                if cacheable {
                    self.cache.set(key, outcome.clone());
                }

                info!(duration_ms, cached = cacheable, "handler completed");
                self.activity.record(ActivityRecord::new(
                    component,
                    "completed",
                    json!({ "duration_ms": duration_ms, "cached": cacheable }),
                ));
                outcome
            }
            Execution::Failed(message) => {
                self.metrics.inc_failed();
                let truncated = truncate_chars(&message, ERROR_MESSAGE_LIMIT);

                warn!(duration_ms, error = %message, "handler failed");
                self.activity.record(ActivityRecord::new(
                    component,
                    "failed",
                    json!({ "duration_ms": duration_ms, "error": truncated }),
                ));
                DispatchOutcome::failed(
                    query,
                    classification,
                    format!("Could not fully process query '{query}'. Error: {truncated}..."),
                    duration_ms,
                )
            }
            Execution::TimedOut => {
                self.metrics.inc_timed_out();

                warn!(duration_ms, "handler timed out");
                self.activity.record(ActivityRecord::new(
                    component,
                    "timed_out",
                    json!({ "duration_ms": duration_ms, "deadline_ms": millis(self.config.deadline) }),
                ));
                DispatchOutcome::timed_out(
                    query,
                    classification,
                    format!(
                        "Query '{query}' timed out after {:?}. Try a more specific or simpler question.",
                        self.config.deadline
                    ),
                    duration_ms,
                )
            }
        }
    }

    fn unexpected_failure(&self, query: &str, description: &str, started: Instant) -> DispatchOutcome {
        self.metrics.inc_error();
        error!(error = %description, "dispatch failed unexpectedly");
        self.activity.record(ActivityRecord::new(
            "system",
            "error",
            json!({ "error": description, "query": query }),
        ));

        DispatchOutcome::error(
            query,
            truncate_chars(description, ERROR_MESSAGE_LIMIT),
            millis(started.elapsed()),
        )
    }
}

fn handler_component(classification: &Classification) -> String {
    format!("{}_handler", classification.intent)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

fn describe_join_error(join_error: JoinError) -> String {
    if join_error.is_panic() {
        format!(
            "handler panicked: {}",
            panic_message(join_error.into_panic().as_ref())
        )
    } else {
        "handler task was cancelled".to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
