use std::env;
use std::time::Duration;

use serde::Serialize;

use crate::error::DispatchError;

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_HANDLER_STEPS: u32 = 20;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Timing knobs for the dispatch pipeline.
///
/// `deadline` is the budget handed to a handler; the dispatcher stops waiting
/// for good after `deadline + grace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchConfig {
    pub deadline: Duration,
    pub grace: Duration,
    pub max_handler_steps: u32,
    pub cache_ttl: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            grace: DEFAULT_GRACE,
            max_handler_steps: DEFAULT_MAX_HANDLER_STEPS,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            deadline: env_secs("CONSULTA_DEADLINE_SECS").unwrap_or(defaults.deadline),
            grace: env_secs("CONSULTA_GRACE_SECS").unwrap_or(defaults.grace),
            max_handler_steps: env::var("CONSULTA_MAX_STEPS")
                .ok()
                .and_then(|value| value.trim().parse::<u32>().ok())
                .unwrap_or(defaults.max_handler_steps),
            cache_ttl: env_secs("CONSULTA_CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl),
        }
    }

    pub fn hard_limit(&self) -> Duration {
        self.deadline + self.grace
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.deadline.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "deadline must be greater than zero".to_string(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "cache ttl must be greater than zero".to_string(),
            ));
        }
        if self.max_handler_steps == 0 {
            return Err(DispatchError::InvalidConfig(
                "max handler steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
