use thiserror::Error;

use crate::lead::LeadStatus;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timestamp parse error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Lead '{lead_id}' not found")]
    LeadNotFound { lead_id: String },

    #[error("Caller '{caller_id}' not found")]
    CallerNotFound { caller_id: String },

    #[error("Lead '{lead_id}' is already '{status}', not routable")]
    LeadNotRoutable { lead_id: String, status: LeadStatus },

    #[error("Invalid phone '{phone}': fewer than {min_digits} digits")]
    InvalidPhone { phone: String, min_digits: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RouterResult<T> = Result<T, RouterError>;

impl RouterError {
    /// Transient storage contention (SQLITE_BUSY / SQLITE_LOCKED). The
    /// atomic cursor tier retries these once before degrading.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RouterError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }

    /// A UNIQUE constraint rejection. Intake treats a unique-phone
    /// violation as "duplicate lead", not as a failure.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            RouterError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
