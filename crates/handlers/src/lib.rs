mod offline;
mod prompts;
mod remote;

use std::sync::Arc;

use anyhow::Result;
use consulta_core::Intent;
use consulta_dispatch::HandlerRegistry;
use tracing::info;

pub use offline::OfflineHandler;
pub use prompts::system_prompt;
pub use remote::{
    build_client, ChatCompletionHandler, RemoteConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_REQUEST_TIMEOUT,
};

/// One chat completion handler per intent, sharing a single HTTP client.
pub fn remote_registry(config: RemoteConfig) -> Result<HandlerRegistry> {
    let client = build_client(&config)?;
    info!(endpoint = %config.endpoint, model = %config.model, "using remote handlers");

    let registry = Intent::ALL
        .into_iter()
        .fold(HandlerRegistry::builder(), |builder, intent| {
            builder.register(
                intent,
                Arc::new(ChatCompletionHandler::new(
                    intent,
                    config.clone(),
                    client.clone(),
                )),
            )
        })
        .build()?;
    Ok(registry)
}

pub fn offline_registry() -> HandlerRegistry {
    HandlerRegistry::uniform(Arc::new(OfflineHandler))
}

/// Remote handlers when a token is configured, offline ones otherwise.
pub fn registry_from_env(force_offline: bool) -> Result<HandlerRegistry> {
    match RemoteConfig::from_env() {
        Some(config) if !force_offline => remote_registry(config),
        _ => {
            info!("no remote endpoint in use, answering offline");
            Ok(offline_registry())
        }
    }
}
