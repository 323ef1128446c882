//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Rule failure (CoreError)            │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  DbError (this module) ← Categorized: constraint / store / domain      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Transaction rolled back (guard dropped without commit)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Application layer decides whether to retry                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Absence on reads is not an error: lookups return `Option` and listings
//! return an empty `Vec`. `NotFound` is reserved for writes that must hit
//! an existing row.

use sqlx::error::ErrorKind;
use thiserror::Error;

use tienda_core::{CoreError, ValidationError};

/// Which database constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// PRIMARY KEY or UNIQUE clash under the abort policy.
    Unique,
    /// order_items.orderId does not reference an existing order.
    ForeignKey,
    /// NOT NULL column left empty.
    NotNull,
    /// CHECK clause (negative price or quantity).
    Check,
    /// Constraint SQLite did not classify.
    Other,
}

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A write was rejected by a table constraint; the transaction was
    /// rolled back.
    #[error("Constraint violation ({kind:?}): {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        message: String,
    },

    /// A write targeted a row that does not exist.
    ///
    /// ## When This Occurs
    /// - `update` of a cart item whose id is unknown or unassigned
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The caller withdrew before the operation completed. Nothing was
    /// committed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The underlying engine cannot serve requests.
    ///
    /// ## When This Occurs
    /// - Database file can't be opened or created
    /// - Pool closed after `Database::close`
    /// - I/O failure, corruption, acquire timeout
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed for a reason other than a constraint.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A record broke a domain rule before reaching the store.
    #[error(transparent)]
    Domain(#[from] CoreError),

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

    /// Returns true for any constraint rejection.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation { .. })
    }

    /// Returns true when the store itself is unusable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::StoreUnavailable(_))
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database (constraint) → DbError::ConstraintViolation
/// sqlx::Error::Database (other)      → DbError::QueryFailed
/// sqlx::Error::Io / Pool* / Tls      → DbError::StoreUnavailable
/// Other                              → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let kind = match db_err.kind() {
                    ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                    ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                    ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                    ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                    // Extended codes sqlx leaves unclassified (e.g. TRIGGER)
                    _ if message.contains("constraint failed") => Some(ConstraintKind::Other),
                    _ => None,
                };

                match kind {
                    Some(kind) => DbError::ConstraintViolation { kind, message },
                    None => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::Io(e) => DbError::StoreUnavailable(e.to_string()),

            sqlx::Error::PoolTimedOut => {
                DbError::StoreUnavailable("Connection pool exhausted".to_string())
            }

            sqlx::Error::PoolClosed => DbError::StoreUnavailable("Pool is closed".to_string()),

            sqlx::Error::WorkerCrashed => {
                DbError::StoreUnavailable("SQLite worker crashed".to_string())
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

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
