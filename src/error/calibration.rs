// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// No random-trigger events were seen, baseline cannot be reduced
    pub const NO_RANDOM_EVENTS: i32 = 2001;

    /// Input table has the wrong number of entries
    pub const TABLE_SHAPE: i32 = 2002;

    /// Channel coordinates outside the 16 x 14 grid
    pub const CHANNEL_OUT_OF_RANGE: i32 = 2003;

    /// Histograms with different binning cannot be merged
    pub const BINNING_MISMATCH: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// Fields: error_code, component, message and the caller-supplied context.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Finalization, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These cover building the per-pass inputs (baseline tables, calibration
/// map, bad-channel list) and reducing the accumulated statistics at the end
/// of a pass.
///
/// Error code ranges: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Baseline reduction needs at least one random-trigger event
    NoRandomEvents,

    /// A named table does not have the expected number of entries
    TableShape {
        table: String,
        expected: usize,
        found: usize,
    },

    /// Channel coordinates outside the detector grid
    ChannelOutOfRange { sector: usize, module: usize },

    /// Histograms with different binning were combined
    BinningMismatch { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::NoRandomEvents => CalibrationErrorCodes::NO_RANDOM_EVENTS,
            CalibrationError::TableShape { .. } => CalibrationErrorCodes::TABLE_SHAPE,
            CalibrationError::ChannelOutOfRange { .. } => {
                CalibrationErrorCodes::CHANNEL_OUT_OF_RANGE
            }
            CalibrationError::BinningMismatch { .. } => CalibrationErrorCodes::BINNING_MISMATCH,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::NoRandomEvents => {
                "No random-trigger events observed; cannot derive baseline".to_string()
            }
            CalibrationError::TableShape {
                table,
                expected,
                found,
            } => format!(
                "Table {} has {} entries, expected {}",
                table, found, expected
            ),
            CalibrationError::ChannelOutOfRange { sector, module } => format!(
                "Channel (sector {}, module {}) out of range",
                sector, module
            ),
            CalibrationError::BinningMismatch { reason } => {
                format!("Histogram binning mismatch: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
