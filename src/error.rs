//! Error types for dataset preparation and recurrent dynamics.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for task-rnn operations.
pub type TaskRnnResult<T> = Result<T, TaskRnnError>;

/// Errors raised by the dataset pipeline and the recurrent cells.
///
/// None of these are transient: every variant is either a configuration
/// problem, a corrupt or missing artifact, or a programming error in how a
/// cell is driven.
#[derive(Debug, Error)]
pub enum TaskRnnError {
    /// The data home could not be resolved
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Build or loader parameters cannot be honoured
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The task environment produced unusable trajectories
    #[error("Dataset generation error: {0}")]
    Generation(String),

    /// No artifact exists at the expected location
    #[error("Dataset artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// The artifact exists but is incomplete or inconsistent
    #[error("Corrupt dataset artifact {}: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// `step` called before `init`
    #[error("{model} is unbound - call init() before step()")]
    UnboundCell { model: &'static str },

    /// Tensor width or batch size disagrees with the bound sizes
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact encoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl TaskRnnError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a dataset generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create an artifact corruption error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
