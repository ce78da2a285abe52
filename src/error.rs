// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for photo-finder

use thiserror::Error;

/// Result type alias for photo-finder operations
pub type Result<T> = std::result::Result<T, FinderError>;

/// photo-finder error types
#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Face model not available: {0}")]
    ModelUnavailable(String),

    #[error("Face engine returned status {0}")]
    EngineStatus(u16),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No face detected in {0}")]
    NoFaceDetected(String),

    #[error("Descriptor length mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Reference error: {0}")]
    Reference(String),

    #[error("No image files found in {0}")]
    NoImages(String),

    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("Duplicate photo id: {0}")]
    DuplicateId(String),
}

impl FinderError {
    /// Whether retrying the same request could succeed (connection, timeout, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            FinderError::Api(e) => {
                e.is_connect() || e.is_timeout() || e.status().is_some_and(|s| s.is_server_error())
            }
            FinderError::EngineStatus(status) => *status >= 500,
            _ => false,
        }
    }
}
