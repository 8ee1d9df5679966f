//! Error handling for the tracker.
//!
//! Every fallible operation in the crate returns an [`OdResult`]. Prefer adding a
//! variant here over squeezing a new failure into [`OdError::Validation`] or a
//! stringly [`OdError::Forbidden`], so that callers can report failures distinctly.

use chrono::NaiveDate;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::models::{OdStatus, Role};

/// The error enum for all error handling across the tracker.
#[derive(Debug, Error)]
pub enum OdError {
    /// Input was rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced user, event, request or record does not exist.
    #[error("{kind} `{key}` not found")]
    NotFound { kind: &'static str, key: String },

    /// The acting principal is not allowed to perform the operation.
    #[error("access forbidden: {0}")]
    Forbidden(String),

    /// The acting principal does not hold the role the operation requires.
    #[error("operation requires role {required}, but {email} is {actual}")]
    WrongRole {
        email: String,
        required: Role,
        actual: Role,
    },

    /// An OD request can only leave the `pending` state once.
    #[error("cannot move an OD request from {from} to {to}")]
    InvalidTransition { from: OdStatus, to: OdStatus },

    /// More than one attendance record was observed for the same student and date.
    ///
    /// This is reported, never merged automatically.
    #[error("{count} attendance records found for {student_email} on {date}")]
    ConcurrencyAnomaly {
        student_email: String,
        date: NaiveDate,
        count: usize,
    },

    /// The document store rejected or failed a query.
    #[error("store error: {0}")]
    RemoteStore(#[from] DieselError),

    /// The document store could not be reached.
    #[error("error connecting to store: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// A spreadsheet could not be read at all.
    #[error("could not read spreadsheet: {0}")]
    Import(#[from] csv::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// The return type for all tracker operations.
pub type OdResult<T> = Result<T, OdError>;

impl OdError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        OdError::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Only failures of the store itself qualify; validation and authorization
    /// failures will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            OdError::Connection(_) => true,
            OdError::RemoteStore(DieselError::DatabaseError(kind, info)) => {
                matches!(kind, DatabaseErrorKind::ClosedConnection)
                    || is_busy_message(info.message())
            }
            OdError::RemoteStore(DieselError::BrokenTransactionManager) => true,
            _ => false,
        }
    }
}

// SQLite reports contention as `database is locked` / `database table is locked`
// (SQLITE_BUSY / SQLITE_LOCKED) and diesel surfaces those as `Unknown`.
fn is_busy_message(message: &str) -> bool {
    message.contains("locked") || message.contains("busy")
}

/// Reasons input is rejected before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid email address `{0}`")]
    InvalidEmail(String),

    #[error("invalid name `{0}`: use 2-50 letters, spaces, hyphens or apostrophes")]
    InvalidName(String),

    #[error("end date {to} is before start date {from}")]
    InvertedRange { from: String, to: String },

    #[error("attachment is {size} bytes, the limit is {max} bytes")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("attachment type `{0}` is not allowed, use JPEG, PNG or PDF")]
    AttachmentType(String),

    #[error("attachment data is not valid base64")]
    AttachmentEncoding,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("cannot mark attendance for {0}, which is in the future")]
    FutureDate(NaiveDate),

    #[error("missing required columns: {0}")]
    MissingColumns(String),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    struct Info(&'static str);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn locked_database_is_retryable() {
        let err = OdError::RemoteStore(DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new(Info("database is locked")),
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn constraint_violations_and_validation_are_not_retryable() {
        let err = OdError::RemoteStore(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(Info("UNIQUE constraint failed: users.email")),
        ));
        assert!(!err.is_retryable());
        assert!(!OdError::from(ValidationError::MissingField("name")).is_retryable());
        assert!(!OdError::not_found("event", "abc").is_retryable());
    }
}
