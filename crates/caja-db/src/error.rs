//! # Database and Service Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          LedgerError (caja-core)           │
//! │       │                                    │                            │
//! │       ▼                                    │                            │
//! │  DbError ← adds categorization             │                            │
//! │       │                                    │                            │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │                 CajaError ← what every service operation returns        │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │        caller renders kind(): state / validation / rule / consistency  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use caja_core::{ErrorKind, LedgerError, ValidationError};
use thiserror::Error;

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - A second open session (`cash_sessions.open_slot`)
    /// - Duplicate primary key
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed, including CHECK and trigger aborts.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Stored data could not be decoded (e.g. malformed JSON details).
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true for a UNIQUE violation on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Corrupt(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Corrupt(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Error returned by ledger services: a ledger refusal or a storage failure.
#[derive(Debug, Error)]
pub enum CajaError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl CajaError {
    /// Ledger classification, `None` for storage failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CajaError::Ledger(e) => Some(e.kind()),
            CajaError::Db(_) => None,
        }
    }

    pub fn is_state_error(&self) -> bool {
        self.kind() == Some(ErrorKind::State)
    }

    pub fn is_business_rule(&self) -> bool {
        self.kind() == Some(ErrorKind::BusinessRule)
    }

    /// Returns the ledger error, if any.
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            CajaError::Ledger(e) => Some(e),
            CajaError::Db(_) => None,
        }
    }
}

impl From<sqlx::Error> for CajaError {
    fn from(err: sqlx::Error) -> Self {
        CajaError::Db(err.into())
    }
}

impl From<ValidationError> for CajaError {
    fn from(err: ValidationError) -> Self {
        CajaError::Ledger(err.into())
    }
}

/// Result type for service operations.
pub type CajaResult<T> = Result<T, CajaError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_forwarding() {
        let err: CajaError = LedgerError::NoOpenSession.into();
        assert!(err.is_state_error());
        assert!(!err.is_business_rule());

        let err: CajaError = DbError::PoolExhausted.into();
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_unique_violation_match() {
        let err = DbError::UniqueViolation {
            field: "cash_sessions.open_slot".into(),
            value: "unknown".into(),
        };
        assert!(err.is_unique_violation_on("cash_sessions.open_slot"));
        assert!(!err.is_unique_violation_on("cash_sessions.id"));
    }
}
