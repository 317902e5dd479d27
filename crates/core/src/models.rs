use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Research,
    Chart,
    Weather,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Research, Intent::Chart, Intent::Weather];

    /// Label used when no intent wins outright.
    pub const DEFAULT: Intent = Intent::Research;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Chart => "chart",
            Self::Weather => "weather",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "research" | "pesquisa" => Some(Self::Research),
            "chart" | "grafico" | "gráfico" => Some(Self::Chart),
            "weather" | "clima" => Some(Self::Weather),
            _ => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Completed,
    Failed,
    TimedOut,
    Error,
}

/// Terminal result of one dispatch call.
///
/// `content` is set only for completed outcomes, `error_message` for every
/// other status. `handler_used` and `classification` are present whenever
/// the pipeline got far enough to compute them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub id: Uuid,
    pub query: String,
    pub status: DispatchStatus,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_used: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cached: bool,
}

impl DispatchOutcome {
    pub fn completed(
        query: &str,
        classification: Classification,
        content: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            handler_used: Some(classification.intent),
            classification: Some(classification),
            content: Some(content),
            ..Self::base(query, DispatchStatus::Completed, duration_ms)
        }
    }

    pub fn failed(
        query: &str,
        classification: Classification,
        error_message: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            handler_used: Some(classification.intent),
            classification: Some(classification),
            error_message: Some(error_message),
            ..Self::base(query, DispatchStatus::Failed, duration_ms)
        }
    }

    pub fn timed_out(
        query: &str,
        classification: Classification,
        error_message: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            handler_used: Some(classification.intent),
            classification: Some(classification),
            error_message: Some(error_message),
            ..Self::base(query, DispatchStatus::TimedOut, duration_ms)
        }
    }

    pub fn error(query: &str, error_message: String, duration_ms: u64) -> Self {
        Self {
            error_message: Some(error_message),
            ..Self::base(query, DispatchStatus::Error, duration_ms)
        }
    }

    /// Copy of a stored outcome as handed back on a cache hit.
    pub fn into_cached(self) -> Self {
        Self {
            cached: true,
            ..self
        }
    }

    pub fn is_cacheable(&self) -> bool {
        self.status == DispatchStatus::Completed && !self.cached
    }

    fn base(query: &str, status: DispatchStatus, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.to_string(),
            status,
            success: status == DispatchStatus::Completed,
            content: None,
            error_message: None,
            handler_used: None,
            classification: None,
            duration_ms,
            timestamp: Utc::now(),
            cached: false,
        }
    }
}
