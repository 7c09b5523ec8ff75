use labcore_core::LabError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Lab(#[from] LabError),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Domain error carried by this store error, if any
    pub fn as_lab(&self) -> Option<&LabError> {
        match self {
            StoreError::Lab(e) => Some(e),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Lab(e) => e.code(),
            _ => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
