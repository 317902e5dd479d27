use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use consulta_core::Intent;
use consulta_dispatch::{Handler, HandlerContext, HandlerError};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::prompts::system_prompt;

pub const DEFAULT_ENDPOINT: &str = "https://models.github.ai/inference";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TEMPERATURE: f32 = 0.3;
const TOKEN_VARS: [&str; 3] = ["CONSULTA_API_TOKEN", "GITHUB_TOKEN", "OPENAI_API_KEY"];
const UPSTREAM_BODY_LIMIT: usize = 500;

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub api_token: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: api_token.into(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// `None` when no token is configured.
    pub fn from_env() -> Option<Self> {
        let api_token = first_token(|name| env::var(name).ok())?;

        let mut config = Self::new(api_token);
        if let Ok(endpoint) = env::var("CONSULTA_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(model) = env::var("CONSULTA_MODEL") {
            config.model = model;
        }
        if let Some(timeout) = env::var("CONSULTA_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(timeout);
        }
        Some(config)
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

/// First non-blank token in `TOKEN_VARS` order.
fn first_token(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    TOKEN_VARS
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|value| !value.trim().is_empty())
}

pub fn build_client(config: &RemoteConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(config.request_timeout)
        .build()
        .context("failed to build HTTP client")
}

pub struct ChatCompletionHandler {
    name: String,
    intent: Intent,
    config: RemoteConfig,
    client: Client,
}

impl ChatCompletionHandler {
    pub fn new(intent: Intent, config: RemoteConfig, client: Client) -> Self {
        Self {
            name: format!("{intent}_chat_completion"),
            intent,
            config,
            client,
        }
    }

    fn payload(&self, query: &str, ctx: &HandlerContext) -> Value {
        let context = serde_json::json!({
            "entities": ctx.classification.entities,
            "keywords": ctx.classification.keywords,
            "max_steps": ctx.max_steps,
        });

        serde_json::json!({
            "model": self.config.model,
            "temperature": TEMPERATURE,
            "messages": [
                { "role": "system", "content": system_prompt(self.intent) },
                { "role": "user", "content": query },
                { "role": "user", "content": format!("Contexto JSON: {context}") }
            ]
        })
    }

    async fn complete(&self, query: &str, ctx: &HandlerContext) -> Result<String, HandlerError> {
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(self.config.api_token.as_str())
            .json(&self.payload(query, ctx))
            .send()
            .await
            .map_err(|err| HandlerError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HandlerError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(UPSTREAM_BODY_LIMIT).collect(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| HandlerError::Other(format!("completion parse failed: {err}")))?;
        extract_message_content(&body)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| HandlerError::Other("completion output text missing".to_string()))
    }
}

#[async_trait]
impl Handler for ChatCompletionHandler {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, ctx), fields(handler = %self.name))]
    async fn invoke(&self, query: &str, ctx: HandlerContext) -> Result<String, HandlerError> {
        debug!(model = %self.config.model, "requesting chat completion");
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(HandlerError::Cancelled),
            result = self.complete(query, &ctx) => result,
        }
    }
}

fn extract_message_content(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
