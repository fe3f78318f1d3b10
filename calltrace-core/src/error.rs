use thiserror::Error;

/// Core error type for calltrace.
/// Setup paths (configuration, adapter registry) and the bundled providers
/// return it. The interception path never produces one: a wrapped operation's
/// own error is handed back to the caller as-is.
#[derive(Debug, Error)]
pub enum CallTraceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid config {path}: {message}")]
    Config { path: String, message: String },

    #[error("unknown adapter: {provider}")]
    UnknownAdapter { provider: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, CallTraceError>;
