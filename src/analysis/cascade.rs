// Selection cascade - per-event threshold gates
//
// Stages after readout completeness (which is checked while building the
// event energies):
// 1. Random-trigger tag and muon-trigger flag (never reject)
// 2. Loose gate: exactly one sector above `loose_sector_sigma`
// 3. Tight gate: exactly one sector above `tight_sector_sigma`
//    The loose gate's sector is the muon sector.
// 4. Channel multiplicity: good channels of the muon sector above
//    mean + n*RMS must strictly exceed the (possibly relaxed) threshold
// 5. Band coverage: above-noise channels of the muon sector must reach
//    `min_bands_with_hit` of the front/mid/rear bands
//
// Passing everything gives AcceptedNoTrigger, or AcceptedWithTrigger when the
// muon-trigger flag is set. Evaluation is pure; counters and histograms are
// filled by the caller from the returned decision.

use serde::{Deserialize, Serialize};

use crate::analysis::energy::EventEnergies;
use crate::analysis::event::TriggerFlags;
use crate::analysis::significance::SignificanceScores;
use crate::calibration::{BadChannelSet, BaselineStatistics};
use crate::config::SelectionConfig;
use crate::geometry::{Channel, ModuleBand};

/// Gate at which an event was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectStage {
    /// Readout did not hold exactly one hit per channel
    IncompleteReadout,
    /// Zero or several sectors above the loose threshold
    LooseHotSector,
    /// Zero or several sectors above the tight threshold
    TightHotSector,
    /// Too few above-noise channels in the muon sector
    ChannelMultiplicity,
    /// Above-noise channels do not cover enough module bands
    BandCoverage,
}

/// Terminal outcome of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Rejected(RejectStage),
    AcceptedNoTrigger,
    AcceptedWithTrigger,
}

impl Classification {
    /// Passed every gate, with or without the muon trigger
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Classification::Rejected(_))
    }

    pub fn is_accepted_with_trigger(&self) -> bool {
        matches!(self, Classification::AcceptedWithTrigger)
    }
}

/// Which module bands hold at least one above-noise channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCoverage {
    pub front: bool,
    pub mid: bool,
    pub rear: bool,
}

impl BandCoverage {
    pub fn from_modules(modules: impl IntoIterator<Item = usize>) -> Self {
        let mut coverage = Self::default();
        for module in modules {
            match ModuleBand::of_module(module) {
                ModuleBand::Front => coverage.front = true,
                ModuleBand::Mid => coverage.mid = true,
                ModuleBand::Rear => coverage.rear = true,
            }
        }
        coverage
    }

    /// Number of bands with a hit
    pub fn count(&self) -> usize {
        [self.front, self.mid, self.rear]
            .iter()
            .filter(|hit| **hit)
            .count()
    }
}

/// Everything the cascade learned about one event
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeDecision {
    pub classification: Classification,
    pub is_random: bool,
    pub has_trigger: bool,
    /// Sectors above the loose threshold
    pub loose_sectors: Vec<usize>,
    /// Sectors above the tight threshold
    pub tight_sectors: Vec<usize>,
    /// Set once both hot-sector gates passed
    pub muon_sector: Option<usize>,
    /// Good channels of every sector above noise; filled once both
    /// hot-sector gates passed
    pub above_noise: Vec<Channel>,
    /// Set once the channel multiplicity gate was evaluated and passed
    pub bands: Option<BandCoverage>,
}

impl CascadeDecision {
    /// Above-noise channels inside the muon sector
    pub fn muon_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.above_noise
            .iter()
            .copied()
            .filter(move |c| Some(c.sector) == self.muon_sector)
    }

    /// Reached the stage after both hot-sector gates
    pub fn passed_hot_sector_gates(&self) -> bool {
        self.muon_sector.is_some()
    }

    /// Reached the band coverage gate
    pub fn passed_channel_multiplicity(&self) -> bool {
        self.bands.is_some()
    }
}

/// Threshold gates evaluated against one pass's baseline snapshot
#[derive(Debug, Clone, Copy)]
pub struct SelectionCascade<'a> {
    config: &'a SelectionConfig,
    baseline: &'a BaselineStatistics,
    bad: &'a BadChannelSet,
}

impl<'a> SelectionCascade<'a> {
    pub fn new(
        config: &'a SelectionConfig,
        baseline: &'a BaselineStatistics,
        bad: &'a BadChannelSet,
    ) -> Self {
        Self {
            config,
            baseline,
            bad,
        }
    }

    /// Good channels whose energy exceeds `mean + channel_noise_sigma * RMS`
    pub fn above_noise(&self, energies: &EventEnergies) -> Vec<Channel> {
        Channel::all()
            .filter(|c| self.bad.is_good(*c))
            .filter(|c| {
                energies.channel(*c)
                    > self
                        .baseline
                        .channel(*c)
                        .threshold(self.config.channel_noise_sigma)
            })
            .collect()
    }

    pub fn evaluate(
        &self,
        energies: &EventEnergies,
        scores: &SignificanceScores,
        triggers: &TriggerFlags,
    ) -> CascadeDecision {
        let mut decision = CascadeDecision {
            classification: Classification::Rejected(RejectStage::LooseHotSector),
            is_random: triggers.is_random_trigger(),
            has_trigger: triggers.has_muon_trigger(),
            loose_sectors: scores.sectors_above(self.config.loose_sector_sigma),
            tight_sectors: scores.sectors_above(self.config.tight_sector_sigma),
            muon_sector: None,
            above_noise: Vec::new(),
            bands: None,
        };

        if decision.loose_sectors.len() != 1 {
            return decision;
        }
        if decision.tight_sectors.len() != 1 {
            decision.classification = Classification::Rejected(RejectStage::TightHotSector);
            return decision;
        }

        let muon_sector = decision.loose_sectors[0];
        decision.muon_sector = Some(muon_sector);
        decision.above_noise = self.above_noise(energies);

        let muon_count = decision.muon_channels().count();
        if muon_count <= self.config.channel_threshold(muon_sector) {
            decision.classification = Classification::Rejected(RejectStage::ChannelMultiplicity);
            return decision;
        }

        let bands = BandCoverage::from_modules(decision.muon_channels().map(|c| c.module));
        decision.bands = Some(bands);
        if bands.count() < self.config.min_bands_with_hit {
            decision.classification = Classification::Rejected(RejectStage::BandCoverage);
            return decision;
        }

        decision.classification = if decision.has_trigger {
            Classification::AcceptedWithTrigger
        } else {
            Classification::AcceptedNoTrigger
        };
        decision
    }
}

#[cfg(test)]
#[path = "cascade_tests.rs"]
mod tests;
