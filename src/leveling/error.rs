use thiserror::Error;

/// Errors surfaced to whoever invoked a leveling command.
#[derive(Debug, Error)]
pub enum LevelingError {
    /// Input out of range or otherwise unusable; shown to the user as a rejection.
    #[error("{0}")]
    Validation(String),

    /// The referenced mapping, role or channel does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LevelingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
