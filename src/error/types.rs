//! Application error types
//!
//! `AppError` is what the binary reports to the user. Library errors are
//! folded into it so that configuration problems, key exhaustion and remote
//! failures map to distinct messages and exit codes.

use crate::services::backend_pool::ConfigurationError;
use crate::services::failover::InvokeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// No usable key configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every configured key hit its quota
    #[error("{0}")]
    KeysExhausted(String),

    /// A single remote call failed for a non-quota reason
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Bad input from the command line or files
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Configuration(_) => 78,
            AppError::KeysExhausted(_) => 75,
            AppError::Remote(_) => 69,
            AppError::InvalidInput(_) => 64,
            AppError::Internal(_) => 70,
        }
    }

    /// True when the user should fix the key settings and retry
    pub fn needs_reconfiguration(&self) -> bool {
        matches!(self, AppError::Configuration(_) | AppError::KeysExhausted(_))
    }
}

impl From<ConfigurationError> for AppError {
    fn from(err: ConfigurationError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl<E: std::error::Error + 'static> From<InvokeError<E>> for AppError {
    fn from(err: InvokeError<E>) -> Self {
        match err {
            InvokeError::Configuration(e) => e.into(),
            InvokeError::AllCredentialsExhausted { .. } => AppError::KeysExhausted(err.to_string()),
            InvokeError::Fatal { source, .. } => AppError::Remote(source.to_string()),
        }
    }
}
