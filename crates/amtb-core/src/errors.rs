use std::{path::PathBuf, time::Duration};

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot core can
/// decide what is user-visible, what is retried and what is only logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("user is not on the allow-list")]
    Unauthorized,

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{service} error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("error loading template {path}: {reason}")]
    TemplateLoad { path: PathBuf, reason: String },

    #[error("error executing template: {0}")]
    TemplateExec(String),

    #[error("session token not found: {0}")]
    SessionNotFound(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Whether the failure should be reported back to the chat that asked for it.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            Error::SessionNotFound(_) | Error::Delivery(_) | Error::RateLimited { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
