// Table store error types and constants

use crate::error::{CalibrationError, ErrorCode};
use log::error;
use std::fmt;

/// Store error code constants
///
/// Error code range: 1001-1005
pub struct StoreErrorCodes {}

impl StoreErrorCodes {
    /// Reading or writing a store file failed
    pub const IO: i32 = 1001;

    /// A store file is not valid JSON for its schema
    pub const PARSE: i32 = 1002;

    /// A named table is missing from a store file
    pub const MISSING_TABLE: i32 = 1003;

    /// Requested pass has not been written
    pub const PASS_NOT_FOUND: i32 = 1004;

    /// Stored tables are inconsistent with the detector grid
    pub const INVALID_TABLES: i32 = 1005;
}

/// Log a store error with structured context
pub fn log_store_error(err: &StoreError, context: &str) {
    error!(
        "Store error in {}: code={}, component=PassStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors from the file-backed table store
///
/// Error code ranges: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Filesystem failure
    Io { path: String, reason: String },

    /// Malformed JSON
    Parse { path: String, reason: String },

    /// Named table absent from the file
    MissingTable { path: String, table: String },

    /// No output for the requested pass number
    PassNotFound { pass: u32 },

    /// Tables failed validation while loading
    InvalidTables { path: String, source: CalibrationError },
}

impl ErrorCode for StoreError {
    fn code(&self) -> i32 {
        match self {
            StoreError::Io { .. } => StoreErrorCodes::IO,
            StoreError::Parse { .. } => StoreErrorCodes::PARSE,
            StoreError::MissingTable { .. } => StoreErrorCodes::MISSING_TABLE,
            StoreError::PassNotFound { .. } => StoreErrorCodes::PASS_NOT_FOUND,
            StoreError::InvalidTables { .. } => StoreErrorCodes::INVALID_TABLES,
        }
    }

    fn message(&self) -> String {
        match self {
            StoreError::Io { path, reason } => format!("I/O error on {}: {}", path, reason),
            StoreError::Parse { path, reason } => format!("Cannot parse {}: {}", path, reason),
            StoreError::MissingTable { path, table } => {
                format!("Table {} missing from {}", table, path)
            }
            StoreError::PassNotFound { pass } => format!("No output stored for pass {}", pass),
            StoreError::InvalidTables { path, source } => {
                format!("Invalid tables in {}: {}", path, source.message())
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_codes() {
        let io = StoreError::Io {
            path: "a".to_string(),
            reason: "b".to_string(),
        };
        assert_eq!(io.code(), StoreErrorCodes::IO);
        assert_eq!(
            StoreError::PassNotFound { pass: 3 }.code(),
            StoreErrorCodes::PASS_NOT_FOUND
        );
        let invalid = StoreError::InvalidTables {
            path: "p".to_string(),
            source: CalibrationError::NoRandomEvents,
        };
        assert_eq!(invalid.code(), StoreErrorCodes::INVALID_TABLES);
    }

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::MissingTable {
            path: "selection_pass_0001.json".to_string(),
            table: "hist_ch_RMS".to_string(),
        };
        assert_eq!(
            err.message(),
            "Table hist_ch_RMS missing from selection_pass_0001.json"
        );
        assert!(format!("{}", err).contains("1003"));
    }
}
