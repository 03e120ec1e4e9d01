// Cross-worker merge and pass reduction
//
// Runs on the calling thread after every worker has finished:
// 1. Sum worker outputs (counters, accumulators, histograms, accepted events)
// 2. Finalize: next-pass baselines and calibration from the summed data
// 3. Normalize the per-channel energy histograms by their stage counters

use serde::{Deserialize, Serialize};

use crate::analysis::{AcceptedEvent, EventCounters, Stage};
use crate::calibration::{finalize_pass, BaselineStatistics, CalibrationUpdate};
use crate::config::HistogramConfig;
use crate::context::{PassInputs, WorkerOutput};
use crate::diagnostics::DiagnosticHistograms;
use crate::error::CalibrationError;

/// Outcome of a complete pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub counters: EventCounters,
    /// Baselines for the next pass
    pub baseline: BaselineStatistics,
    /// Calibration for the next pass
    pub calibration: CalibrationUpdate,
    /// Normalized diagnostic histograms
    pub diagnostics: DiagnosticHistograms,
    pub accepted: Vec<AcceptedEvent>,
    pub malformed_events: u64,
    pub degenerate_scores: u64,
    /// Normalizations skipped for a zero divisor
    pub skipped_normalizations: usize,
}

/// Condensed, serializable view of a [`PassReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub event_count: [u64; 8],
    pub random_events: u64,
    pub accepted_events: usize,
    pub malformed_events: u64,
    pub degenerate_scores: u64,
    pub reference_mean: f64,
    pub calibration_normalized: bool,
    pub unfilled_channels: usize,
    pub skipped_normalizations: usize,
}

impl PassReport {
    pub fn summary(&self) -> PassSummary {
        PassSummary {
            event_count: *self.counters.slots(),
            random_events: self.counters.get(Stage::RandomTrigger),
            accepted_events: self.accepted.len(),
            malformed_events: self.malformed_events,
            degenerate_scores: self.degenerate_scores,
            reference_mean: self.calibration.reference_mean,
            calibration_normalized: self.calibration.normalized,
            unfilled_channels: self.calibration.unfilled_channels.len(),
            skipped_normalizations: self.skipped_normalizations,
        }
    }
}

/// Sum worker outputs in order
pub fn merge_worker_outputs(
    outputs: impl IntoIterator<Item = WorkerOutput>,
    histograms: &HistogramConfig,
) -> Result<WorkerOutput, CalibrationError> {
    let mut merged = WorkerOutput::empty(histograms);
    for output in outputs {
        merged.merge(output)?;
    }
    Ok(merged)
}

/// Finalize then normalize a merged output
///
/// # Errors
/// `CalibrationError::NoRandomEvents` when no random-trigger event was seen.
pub fn reduce_pass(merged: WorkerOutput, inputs: &PassInputs) -> Result<PassReport, CalibrationError> {
    let WorkerOutput {
        counters,
        noise,
        mut diagnostics,
        accepted,
        malformed_events,
        degenerate_scores,
    } = merged;

    let finalization = finalize_pass(
        &noise,
        &diagnostics.muon_signal,
        &inputs.calibration,
        &inputs.bad_channels,
        inputs.selection.reference_channel,
    )?;
    let skipped_normalizations = diagnostics.normalize(&counters);

    Ok(PassReport {
        counters,
        baseline: finalization.baseline,
        calibration: finalization.calibration,
        diagnostics,
        accepted,
        malformed_events,
        degenerate_scores,
        skipped_normalizations,
    })
}
