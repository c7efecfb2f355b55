//! Custom error types for todosync.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the sync engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for todosync operations
#[derive(Error, Debug)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Provider Errors
    // =========================================================================
    /// No provider configured; reconciliation cannot run
    #[error("No task tracker configured - set `provider` in the config file")]
    ProviderNotConfigured,

    /// Unknown provider name in configuration
    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    /// A remote provider operation failed
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// Provider authentication failed or credentials are missing
    #[error("Provider '{provider}' authentication failed: {message}")]
    Authentication { provider: String, message: String },

    /// A scripted backend call exceeded its timeout
    #[error("Script '{command}' timed out after {timeout_secs}s")]
    ScriptTimeout { command: String, timeout_secs: u64 },

    /// The configured backend script is missing from PATH
    #[error("Missing backend script: {command}")]
    MissingScript { command: String },

    // =========================================================================
    // State Store Errors
    // =========================================================================
    /// Persisted state could not be read or written
    #[error("State store error: {message}")]
    Store { message: String },

    /// Failed to acquire the state store lock
    #[error("Failed to lock state store at {path}: {message}")]
    StoreLock { path: PathBuf, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error means "not set up" rather than "broken".
    ///
    /// Not-configured errors short-circuit a pass before any remote call and
    /// are reported as informational, not as faults.
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::ProviderNotConfigured)
    }

    /// Check if this error is recoverable on a later pass
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::ScriptTimeout { .. } | Self::Authentication { .. }
        )
    }

    /// Get error code for exit status
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            Self::ProviderNotConfigured | Self::UnknownProvider { .. } => 3,
            Self::MissingScript { .. } => 6,
            Self::Authentication { .. } => 2,
            _ => 1,
        }
    }
}

/// Convenience result type for todosync operations
pub type Result<T> = std::result::Result<T, SyncError>;
