use thiserror::Error;

/// Everything that can go wrong inside a tick or at startup
#[derive(Debug, Error)]
pub enum BotError {
    /// Backend unreachable, timed out, refused auth, or answered with garbage.
    /// Transient: the loop retries on the next tick.
    #[error("{operation} unavailable: {reason}")]
    UpstreamUnavailable {
        operation: &'static str,
        reason: String,
    },

    /// The broker refused an order. Not retried within the same tick.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Content search came back empty for a category
    #[error("no results for category '{0}'")]
    NoResults(String),

    /// Missing or invalid credentials/configuration. Fatal, the loop never starts.
    #[error("startup failure: {0}")]
    StartupFailure(String),
}

impl BotError {
    pub fn upstream(operation: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Transient errors are worth another attempt on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        Self::StartupFailure(format!("invalid configuration: {}", err))
    }
}
