//! Error taxonomy of the conversion commands

use crate::scene::SceneError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolidError {
    /// Missing source collection or rig, or invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command issued in the wrong session state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Another command is still running")]
    Busy,

    /// Item skipped because it is not of the expected kind
    #[error("'{name}' is a {found}, expected a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl SolidError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SolidError::Configuration(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        SolidError::Precondition(message.into())
    }
}
