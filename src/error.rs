// src/error.rs

//! Unified error handling for the bulletin pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Timestamp parsing failed
    #[error("Time parse error: {0}")]
    TimeParse(#[from] chrono::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bulletin provider rejected the request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Region geometry could not be interpreted
    #[error("Geometry error for region '{region}': {message}")]
    Geometry { region: String, message: String },

    /// Push delivery failed
    #[error("Push delivery error for subscriber '{subscriber}': {message}")]
    Push {
        subscriber: String,
        message: String,
    },

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create a geometry error with region context.
    pub fn geometry(region: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Geometry {
            region: region.into(),
            message: message.to_string(),
        }
    }

    /// Create a push delivery error with subscriber context.
    pub fn push(subscriber: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Push {
            subscriber: subscriber.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
