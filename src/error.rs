use thiserror::Error;

use std::io::Error as IOError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum LprError {
    /// The persisted classifier is missing, corrupt or was trained for a
    /// different feature layout.
    #[error("failed to load plate classifier from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("plate classifier is not trained or loaded")]
    ClassifierNotReady,

    #[error("region of {width}x{height} has no area")]
    InvalidRegion { width: u32, height: u32 },

    /// The model predicted a label that has no plate category.
    #[error("model predicted unknown category label {0}")]
    UnknownCategory(i32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("training samples: {0}")]
    Dataset(String),

    #[error(transparent)]
    IOError(#[from] IOError),

    #[error(transparent)]
    ImageError(#[from] image::ImageError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    TomlError(#[from] toml::de::Error),
}

impl LprError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LprError::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
