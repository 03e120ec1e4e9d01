// Error types for the halo-muon selection
//
// This module defines the error types for building pass inputs, finalizing
// a pass and persisting tables, each carrying a numeric error code.

mod calibration;
mod store;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use store::{log_store_error, StoreError, StoreErrorCodes};

/// Numeric code and text of a pass failure
///
/// Calibration failures use 2001-2004 and table store failures 1001-1005;
/// `log_calibration_error` and `log_store_error` print both.
pub trait ErrorCode {
    fn code(&self) -> i32;

    /// Message with the offending table, channel or path filled in
    fn message(&self) -> String;
}
