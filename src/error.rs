//! Error types for chq.
//!
//! Defines the main error enum used throughout the crate. Messages never carry
//! credential plaintext; callers that build messages from runtime output must
//! redact it first (see `ShellCommand::redact`).

use thiserror::Error;

/// Main error type for chq operations.
#[derive(Error, Debug)]
pub enum ChqError {
    /// The credential could not be obtained from its secret store.
    #[error("Secret resolution error: {0}")]
    SecretResolution(String),

    /// An argument could not be represented as a shell literal.
    #[error("Quoting error: {0}")]
    Quoting(String),

    /// The container runtime failed or the command exited non-zero.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The caller cancelled an in-flight execution.
    #[error("Execution cancelled")]
    Cancelled,

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChqError {
    /// Creates a secret resolution error with the given message.
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::SecretResolution(msg.into())
    }

    /// Creates a quoting error with the given message.
    pub fn quoting(msg: impl Into<String>) -> Self {
        Self::Quoting(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::SecretResolution(_) => "Secret Error",
            Self::Quoting(_) => "Quoting Error",
            Self::Execution(_) => "Execution Error",
            Self::Cancelled => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using ChqError.
pub type Result<T> = std::result::Result<T, ChqError>;
