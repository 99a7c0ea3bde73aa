use crate::domain::MessageId;

/// Core error type for the relay.
///
/// Adapter crates map their specific errors (teloxide, reqwest) into this type
/// so the dispatch engine can treat every failure the same way: log it, maybe
/// tell an operator, never fail the webhook.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("no link for forwarded message {0:?}")]
    NotFound(MessageId),

    #[error("forwarded message {0:?} is already linked")]
    DuplicateKey(MessageId),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
