// SelectionContext: per-worker selection state
//
// Replaces global histogram registries and framework callbacks with one
// explicit object per worker:
// - constructed from the shared, read-only PassInputs
// - mutated only by process_event (counters, accumulators, histograms)
// - consumed by into_output and handed to the merge step

use std::collections::HashSet;
use std::sync::Arc;

use crate::analysis::{
    AcceptedEvent, Classification, EventCounters, EventEnergies, EventRecord, RejectStage,
    ScoreSite, SelectionCascade, SignificanceScorer, Stage,
};
use crate::calibration::{BadChannelSet, BaselineStatistics, CalibrationMap, NoiseAccumulator};
use crate::config::{AppConfig, HistogramConfig, SelectionConfig};
use crate::diagnostics::DiagnosticHistograms;
use crate::error::CalibrationError;

/// Read-only inputs shared by every worker of a pass
#[derive(Debug, Clone)]
pub struct PassInputs {
    pub baseline: BaselineStatistics,
    pub calibration: CalibrationMap,
    pub bad_channels: BadChannelSet,
    pub selection: SelectionConfig,
    pub histograms: HistogramConfig,
}

impl PassInputs {
    /// Bundle the inputs of a pass; bad-channel factors are forced to 1.0
    pub fn new(
        baseline: BaselineStatistics,
        mut calibration: CalibrationMap,
        bad_channels: BadChannelSet,
        config: &AppConfig,
    ) -> Self {
        let pinned = calibration.pin_bad_channels(&bad_channels);
        if pinned > 0 {
            log::warn!(
                "[PassInputs] {} bad channels had a calibration factor other than 1.0",
                pinned
            );
        }
        Self {
            baseline,
            calibration,
            bad_channels,
            selection: config.selection.clone(),
            histograms: config.histograms.clone(),
        }
    }

    /// Neutral baselines and unit calibration
    pub fn first_pass(bad_channels: BadChannelSet, config: &AppConfig) -> Self {
        Self::new(
            BaselineStatistics::neutral(),
            CalibrationMap::unit(),
            bad_channels,
            config,
        )
    }
}

/// Everything one worker produced during a pass
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    pub counters: EventCounters,
    pub noise: NoiseAccumulator,
    pub diagnostics: DiagnosticHistograms,
    pub accepted: Vec<AcceptedEvent>,
    /// Events dropped at the readout-completeness stage
    pub malformed_events: u64,
    /// Scores that fell back to the zero-RMS sentinel
    pub degenerate_scores: u64,
}

impl WorkerOutput {
    pub fn empty(histograms: &HistogramConfig) -> Self {
        Self {
            counters: EventCounters::new(),
            noise: NoiseAccumulator::new(),
            diagnostics: DiagnosticHistograms::new(histograms),
            accepted: Vec::new(),
            malformed_events: 0,
            degenerate_scores: 0,
        }
    }

    /// Fold another worker's output into this one
    pub fn merge(&mut self, other: WorkerOutput) -> Result<(), CalibrationError> {
        self.diagnostics.merge(&other.diagnostics)?;
        self.counters.merge(&other.counters);
        self.noise.merge(&other.noise);
        self.accepted.extend(other.accepted);
        self.malformed_events += other.malformed_events;
        self.degenerate_scores += other.degenerate_scores;
        Ok(())
    }
}

/// Per-worker selection state
pub struct SelectionContext {
    inputs: Arc<PassInputs>,
    output: WorkerOutput,
    warned_sites: HashSet<ScoreSite>,
}

impl SelectionContext {
    pub fn new(inputs: Arc<PassInputs>) -> Self {
        let output = WorkerOutput::empty(&inputs.histograms);
        Self {
            inputs,
            output,
            warned_sites: HashSet::new(),
        }
    }

    /// Run one event through the full selection and fill the worker state
    ///
    /// Never fails: malformed events are counted and dropped.
    pub fn process_event(&mut self, record: &EventRecord) -> Classification {
        let inputs = Arc::clone(&self.inputs);
        let bad = &inputs.bad_channels;

        self.output.counters.increment(Stage::Read);

        let energies = match EventEnergies::from_record(record, &inputs.calibration, bad) {
            Ok(energies) => energies,
            Err(reason) => {
                tracing::debug!(
                    "[SelectionContext] Dropping run {} event {}: {}",
                    record.id.run,
                    record.id.event,
                    reason
                );
                self.output.malformed_events += 1;
                return Classification::Rejected(RejectStage::IncompleteReadout);
            }
        };
        self.output.counters.increment(Stage::CompleteReadout);

        let scores = SignificanceScorer::new(&inputs.baseline, bad).score(&energies);
        for site in &scores.degenerate {
            self.output.degenerate_scores += 1;
            if self.warned_sites.insert(*site) {
                tracing::warn!(
                    "[SelectionContext] Zero baseline RMS at {:?}; using sentinel significance",
                    site
                );
            }
        }

        let decision = SelectionCascade::new(&inputs.selection, &inputs.baseline, bad)
            .evaluate(&energies, &scores, &record.triggers);

        if decision.is_random {
            self.output
                .noise
                .record_event(energies.channels(), energies.sectors(), bad);
        }
        self.output.counters.record_decision(&decision);
        self.output.diagnostics.record_event(
            record.id.run,
            &energies,
            &scores,
            &decision,
            bad,
            inputs.selection.channel_noise_sigma,
        );

        if let (Some(muon_sector), Some(bands)) = (decision.muon_sector, decision.bands) {
            if decision.classification.is_accepted() {
                self.output.accepted.push(AcceptedEvent::new(
                    record.id,
                    muon_sector,
                    scores.sector(muon_sector),
                    decision.has_trigger,
                    bands,
                    &energies.masked(bad),
                ));
            }
        }

        decision.classification
    }

    pub fn counters(&self) -> &EventCounters {
        &self.output.counters
    }

    pub fn into_output(self) -> WorkerOutput {
        self.output
    }
}
