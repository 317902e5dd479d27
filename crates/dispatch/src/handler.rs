use std::time::Duration;

use async_trait::async_trait;
use consulta_core::{Classification, Intent};
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// Everything a handler is told about the call it is serving.
///
/// `cancel` fires when `deadline` elapses. Handlers that ignore it are
/// abandoned once the grace margin runs out.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub intent: Intent,
    pub classification: Classification,
    pub deadline: Duration,
    pub max_steps: u32,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, query: &str, ctx: HandlerContext) -> Result<String, HandlerError>;
}
