//! Error types shared across SpanCap crates.

use std::path::PathBuf;

/// Top-level error type for SpanCap operations.
#[derive(Debug, thiserror::Error)]
pub enum SpancapError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Topology error: {message}")]
    Topology { message: String },

    #[error("Invalid selection: {message}")]
    Selection { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Overlay surface error: {message}")]
    Surface { message: String },

    #[error("Platform error: {message}")]
    Platform { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SpancapError.
pub type SpancapResult<T> = Result<T, SpancapError>;

impl SpancapError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology {
            message: msg.into(),
        }
    }

    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface {
            message: msg.into(),
        }
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            message: msg.into(),
        }
    }

    /// Whether the error means the core cannot proceed at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_fatal() {
        assert!(SpancapError::config("no displays").is_fatal());
        assert!(!SpancapError::encoder("ffmpeg missing").is_fatal());
        assert!(!SpancapError::selection("zero width").is_fatal());
    }

    #[test]
    fn messages_carry_category() {
        let err = SpancapError::encoder("spawn failed");
        assert_eq!(err.to_string(), "Encoder error: spawn failed");
    }
}
