//! Error types for FaceTrack.

use thiserror::Error;

/// Main error type for FaceTrack operations.
///
/// Only configuration and model-loading problems are errors. A collapsed
/// particle set, missing training data or a patch outside the image are
/// regular tracking outcomes and never produce one of these.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown {kind} type: {name}")]
    UnknownKind { kind: &'static str, name: String },

    #[error("Malformed model: {0}")]
    ModelFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrackError {
    /// Error for a kind string that names no known strategy.
    pub fn unknown(kind: &'static str, name: &str) -> Self {
        Self::UnknownKind {
            kind,
            name: name.to_string(),
        }
    }
}

/// Result type alias for FaceTrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;
