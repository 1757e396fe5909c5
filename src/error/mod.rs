//! # Error Module
//!
//! Error types for the photo culling engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - which image, which pair, what went wrong
//! - **Per-image failures are not fatal** - an unreadable photo becomes its
//!   own group, a failed comparison is a non-match
//! - Only configuration and session bookkeeping mistakes reach the caller

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
///
/// Image, comparison and embedding failures are absorbed per photo or per
/// pair inside the pipeline and never surface here.
#[derive(Error, Debug)]
pub enum CullerError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("No valid image paths found")]
    EmptyInput,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that occur while collecting a batch from disk
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File too large: {path} is {size} bytes (limit {limit})")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
}

/// Errors that occur while resolving or decoding an image
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image not found: {content}")]
    NotFound { content: String },

    #[error("Failed to decode image {content}: {reason}")]
    DecodeError { content: String, reason: String },

    #[error("Image is empty or corrupted: {content}")]
    EmptyImage { content: String },

    #[error("Failed to read image {content}: {source}")]
    IoError {
        content: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resize failed: {0}")]
    ResizeFailed(String),
}

/// Errors from a single pairwise comparison
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Item {index} has no comparable data")]
    MissingData { index: usize },

    #[error("Thumbnail size mismatch: {left:?} vs {right:?}")]
    SizeMismatch {
        left: (u32, u32),
        right: (u32, u32),
    },

    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Errors from feature extraction
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Image {content} could not be loaded for embedding: {reason}")]
    Load { content: String, reason: String },

    #[error("Feature vector has zero magnitude")]
    ZeroVector,

    #[error("Feature vector contains non-finite values")]
    NonFinite,

    #[error("Backend {backend} failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
}

/// Errors from the session store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {id}")]
    NotFound { id: String },

    #[error("Session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("Failed to start analysis worker: {0}")]
    SpawnFailed(String),

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CullerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_includes_content() {
        let error = ImageError::DecodeError {
            content: "uploads/abc/broken.jpg".to_string(),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("uploads/abc/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn empty_input_message_matches_payload() {
        assert_eq!(
            CullerError::EmptyInput.to_string(),
            "No valid image paths found"
        );
    }

    #[test]
    fn invalid_transition_names_states() {
        let error = SessionError::InvalidTransition {
            id: "s-1".to_string(),
            from: "completed",
            to: "running",
        };
        let message = error.to_string();
        assert!(message.contains("completed"));
        assert!(message.contains("running"));
    }

    #[test]
    fn session_error_converts_to_top_level() {
        let error: CullerError = SessionError::Poisoned.into();
        assert!(matches!(error, CullerError::Session(SessionError::Poisoned)));
    }
}
