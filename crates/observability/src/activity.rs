use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// Flat activity record: who did what, with free-form details.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub action: String,
    pub details: Value,
}

impl ActivityRecord {
    pub fn new(component: impl Into<String>, action: impl Into<String>, details: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            component: component.into(),
            action: action.into(),
            details,
        }
    }
}

/// Fire-and-forget destination for activity records.
pub trait ActivitySink: Send + Sync {
    fn record(&self, record: ActivityRecord);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActivitySink;

impl ActivitySink for TracingActivitySink {
    fn record(&self, record: ActivityRecord) {
        let details = serde_json::to_string(&record.details).unwrap_or_default();
        tracing::info!(
            target: "activity",
            timestamp = %record.timestamp.to_rfc3339(),
            component = %record.component,
            action = %record.action,
            details = %details,
            "activity"
        );
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryActivitySink {
    records: Arc<Mutex<Vec<ActivityRecord>>>,
}

impl MemoryActivitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.records.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.action.clone())
            .collect()
    }
}

impl ActivitySink for MemoryActivitySink {
    fn record(&self, record: ActivityRecord) {
        self.records.lock().push(record);
    }
}
