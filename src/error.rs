// Error taxonomy for the finance core
//
// Validation and NotFound are caller mistakes and are never retried.
// Conflict is an optimistic-concurrency collision; services retry it once.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinanceError {
    /// Bad amount/date/type, empty description, duplicate category name
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Record absent or owned by someone else (never distinguished)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Stored version moved since it was read
    #[error("Conflict on {entity} {id}: expected version {expected}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FinanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        FinanceError::Validation(message.into())
    }

    pub fn transaction_not_found(id: &str) -> Self {
        FinanceError::NotFound {
            entity: "transaction",
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, FinanceError::Conflict { .. })
    }
}

impl From<rusqlite::Error> for FinanceError {
    fn from(err: rusqlite::Error) -> Self {
        FinanceError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for FinanceError {
    fn from(err: serde_json::Error) -> Self {
        FinanceError::Storage(format!("document encoding: {}", err))
    }
}

impl From<csv::Error> for FinanceError {
    fn from(err: csv::Error) -> Self {
        FinanceError::Storage(format!("csv: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, FinanceError>;
