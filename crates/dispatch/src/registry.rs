use std::collections::HashMap;
use std::sync::Arc;

use consulta_core::Intent;

use crate::error::DispatchError;
use crate::handler::Handler;

/// Total mapping from intent to handler, checked when it is built.
#[derive(Clone)]
pub struct HandlerRegistry {
    research: Arc<dyn Handler>,
    chart: Arc<dyn Handler>,
    weather: Arc<dyn Handler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Routes every intent to the same handler.
    pub fn uniform(handler: Arc<dyn Handler>) -> Self {
        Self {
            research: Arc::clone(&handler),
            chart: Arc::clone(&handler),
            weather: handler,
        }
    }

    pub fn resolve(&self, intent: Intent) -> Arc<dyn Handler> {
        match intent {
            Intent::Research => Arc::clone(&self.research),
            Intent::Chart => Arc::clone(&self.chart),
            Intent::Weather => Arc::clone(&self.weather),
        }
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<Intent, Arc<dyn Handler>>,
}

impl HandlerRegistryBuilder {
    pub fn register(mut self, intent: Intent, handler: Arc<dyn Handler>) -> Self {
        self.handlers.insert(intent, handler);
        self
    }

    pub fn build(mut self) -> Result<HandlerRegistry, DispatchError> {
        Ok(HandlerRegistry {
            research: self.take(Intent::Research)?,
            chart: self.take(Intent::Chart)?,
            weather: self.take(Intent::Weather)?,
        })
    }

    fn take(&mut self, intent: Intent) -> Result<Arc<dyn Handler>, DispatchError> {
        self.handlers
            .remove(&intent)
            .ok_or(DispatchError::MissingHandler(intent))
    }
}
