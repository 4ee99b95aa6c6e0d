// ⚠️ Error Taxonomy - Run-fatal vs record-scoped
// A RunFatalError aborts the batch before any mutation.
// A RecordError terminates one record and the loop moves on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// RUN-FATAL ERRORS
// ============================================================================

/// Errors that abort the entire run.
#[derive(Debug, Error)]
pub enum RunFatalError {
    /// Header row does not match the declared column schema
    #[error("Fatal Error. Expected column header name {expected} at position {position}, found {actual}")]
    SchemaMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    /// Input has a header but no data rows (only when the job declares it fatal)
    #[error("Input contains no data rows")]
    EmptyInput,

    /// List delimiter collides with the primary delimiter, or is otherwise unusable
    #[error("INVALID DELIMITER. {0}")]
    InvalidDelimiter(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Header row could not be decoded
    #[error("Malformed CSV header: {0}")]
    Csv(#[from] csv::Error),

    /// Target system could not be reached before the run started
    #[error("Store unavailable: {0}")]
    Store(String),
}

// ============================================================================
// RECORD-SCOPED ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MissingRequiredField,
    UnsupportedValue,
    InvalidNumber,
    IdentifierMismatch,
    NotFound,
    ServerValidationFailed,
    CommitFailed,
    /// Row could not be decoded by the CSV reader
    MalformedRow,
    /// Backend failure while looking something up
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingRequiredField => "MissingRequiredField",
            ErrorKind::UnsupportedValue => "UnsupportedValue",
            ErrorKind::InvalidNumber => "InvalidNumber",
            ErrorKind::IdentifierMismatch => "IdentifierMismatch",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ServerValidationFailed => "ServerValidationFailed",
            ErrorKind::CommitFailed => "CommitFailed",
            ErrorKind::MalformedRow => "MalformedRow",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single record. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RecordError {
    pub kind: ErrorKind,
    /// Column (or rule) that failed, when there is one
    pub field: Option<String>,
    pub message: String,
}

impl RecordError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RecordError {
            kind,
            field: None,
            message: message.into(),
        }
    }

    /// Builder: attach the failing column or rule name
    pub fn on(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn missing(field: &str) -> Self {
        RecordError::new(
            ErrorKind::MissingRequiredField,
            format!("Missing required value: {}. Validation failed.", field),
        )
        .on(field)
    }

    pub fn unsupported(field: &str, value: &str) -> Self {
        RecordError::new(
            ErrorKind::UnsupportedValue,
            format!("{} {}: Not Supported!", field, value),
        )
        .on(field)
    }

    pub fn invalid_number(field: &str, value: &str) -> Self {
        RecordError::new(
            ErrorKind::InvalidNumber,
            format!("Invalid input: {} -> {}: Not a number", field, value),
        )
        .on(field)
    }

    pub fn not_found(what: &str, xid: &str) -> Self {
        RecordError::new(ErrorKind::NotFound, format!("{} with XID {} NOT FOUND!", what, xid))
    }
}

/// Every reason one record failed, first failure first
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub errors: Vec<RecordError>,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for RecordFailure {}

impl From<RecordError> for RecordFailure {
    fn from(err: RecordError) -> Self {
        RecordFailure { errors: vec![err] }
    }
}

impl From<Vec<RecordError>> for RecordFailure {
    fn from(errors: Vec<RecordError>) -> Self {
        RecordFailure { errors }
    }
}

// ============================================================================
// STORE ERRORS (collaborator interface)
// ============================================================================

/// Errors surfaced by the target system.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with XID {xid} not found")]
    NotFound { entity: &'static str, xid: String },

    /// Target system refused the write
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("corrupt stored data: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Map a lookup failure to a record error
    pub fn into_lookup_error(self) -> RecordError {
        match self {
            StoreError::NotFound { entity, xid } => RecordError::not_found(entity, &xid),
            other => RecordError::new(ErrorKind::StoreUnavailable, other.to_string()),
        }
    }

    /// Map a write failure to a record error
    pub fn into_commit_error(self) -> RecordError {
        RecordError::new(ErrorKind::CommitFailed, self.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display_includes_kind() {
        let err = RecordError::invalid_number("newLimit", "abc");
        assert_eq!(err.kind, ErrorKind::InvalidNumber);
        assert_eq!(err.field.as_deref(), Some("newLimit"));
        assert!(err.to_string().starts_with("InvalidNumber:"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = RunFatalError::SchemaMismatch {
            position: 1,
            expected: "eventDetectorXid".to_string(),
            actual: "xid".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("eventDetectorXid"));
        assert!(msg.contains("xid"));
    }

    #[test]
    fn test_store_not_found_maps_to_record_not_found() {
        let err = StoreError::NotFound {
            entity: "Event detector",
            xid: "ED_1".to_string(),
        };
        assert!(err.is_not_found());
        let record = err.into_lookup_error();
        assert_eq!(record.kind, ErrorKind::NotFound);
        assert!(record.message.contains("ED_1"));
    }

    #[test]
    fn test_record_failure_keeps_every_error() {
        let failure = RecordFailure::from(vec![
            RecordError::missing("eventDetectorXid"),
            RecordError::invalid_number("newLimit", "x"),
        ]);
        assert_eq!(failure.errors[0].kind, ErrorKind::MissingRequiredField);
        assert_eq!(failure.errors[1].kind, ErrorKind::InvalidNumber);
        assert!(failure.to_string().contains("; "));
    }

    #[test]
    fn test_rejected_maps_to_commit_failed() {
        let record = StoreError::Rejected("locked".to_string()).into_commit_error();
        assert_eq!(record.kind, ErrorKind::CommitFailed);
    }
}
