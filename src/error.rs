use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrendError {
    /// The corpus or the snapshot store could not be read or written.
    #[error("data access error: {0}")]
    DataAccess(#[from] rusqlite::Error),

    #[error("data access error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("window of {0} days is outside the supported 7..=365 range")]
    InvalidWindow(i64),

    #[error("history limit of {0} is outside the supported 1..=50 range")]
    InvalidLimit(usize),

    #[error("analysis did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("analysis worker failed: {0}")]
    Worker(String),
}

impl TrendError {
    pub fn is_data_access(&self) -> bool {
        matches!(self, TrendError::DataAccess(_) | TrendError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, TrendError>;
