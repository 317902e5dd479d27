use consulta_core::Intent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for intent '{0}'")]
    MissingHandler(Intent),

    #[error("invalid dispatch configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("handler unavailable: {0}")]
    Unavailable(String),

    #[error("handler cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
