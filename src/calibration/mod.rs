// Calibration module - baselines, calibration factors and their reduction
//
// Per pass, every worker reads:
// 1. BaselineStatistics: noise mean/RMS per channel and per sector
// 2. CalibrationMap: per-channel energy factor
// 3. BadChannelSet: channels excluded everywhere
//
// and writes a NoiseAccumulator. After the workers are merged, finalize
// reduces the accumulated data into the inputs of the next pass.

pub mod accumulator;
pub mod bad_channels;
pub mod baseline;
pub mod finalize;
pub mod map;

pub use accumulator::{NoiseAccumulator, RunningMoments};
pub use bad_channels::BadChannelSet;
pub use baseline::{BaselineStatistics, NoiseStats};
pub use finalize::{derive_calibration, finalize_pass, CalibrationUpdate, PassFinalization};
pub use map::CalibrationMap;
