// Diagnostic histograms filled per event
//
// Strongly typed replacement for a name → histogram registry. Stable string
// names only appear when the tables are written by the store.
//
// Per-channel energy histograms:
// - muon_signal: muon sector of events accepted with trigger (drives calibration)
// - muon_signal_no_trigger: muon sector of events accepted regardless of trigger
// - neighbour_noise: good channels outside the muon exclusion zone, after the
//   hot-sector gates
// - random_noise: good channels of random-trigger events
//
// After merging, `normalize` divides them by the matching stage counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{CascadeDecision, EventCounters, EventEnergies, SignificanceScores, Stage};
use crate::calibration::BadChannelSet;
use crate::config::HistogramConfig;
use crate::error::CalibrationError;
use crate::geometry::{
    muon_exclusion_zone, Channel, ChannelGrid, SectorGrid, MODULES, SECTORS,
};
use crate::histogram::{Binning, Histogram1D, Histogram2D};

/// Sector index axis of the per-sector 2D histograms
pub fn sector_axis() -> Binning {
    Binning::new(SECTORS, 0.0, SECTORS as f64)
}

/// Above-noise channel multiplicity axis (0..=14 channels)
pub fn multiplicity_axis() -> Binning {
    Binning::new(MODULES + 1, 0.0, (MODULES + 1) as f64)
}

/// Where in the cascade an above-2σ snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotStage {
    /// Every sector, before any gate
    AllSectors,
    /// The loose gate's single sector, before the tight gate
    LooseHotSector,
    /// The muon candidate sector, after both gates
    MuonCandidate,
}

impl SnapshotStage {
    pub const ALL: [SnapshotStage; 3] = [
        SnapshotStage::AllSectors,
        SnapshotStage::LooseHotSector,
        SnapshotStage::MuonCandidate,
    ];
}

/// Channels above 2σ: per-channel counts and per-sector multiplicity
#[derive(Debug, Clone, PartialEq)]
pub struct AboveNoiseSnapshot {
    pub channels_all: ChannelGrid<u64>,
    pub channels_random: ChannelGrid<u64>,
    /// (above-2σ channel count, sector)
    pub multiplicity_all: Histogram2D,
    pub multiplicity_random: Histogram2D,
}

impl AboveNoiseSnapshot {
    fn new() -> Self {
        Self {
            channels_all: ChannelGrid::default(),
            channels_random: ChannelGrid::default(),
            multiplicity_all: Histogram2D::new(multiplicity_axis(), sector_axis()),
            multiplicity_random: Histogram2D::new(multiplicity_axis(), sector_axis()),
        }
    }

    fn record(&mut self, sectors: &[usize], above: &[Channel], is_random: bool) {
        for &channel in above.iter().filter(|c| sectors.contains(&c.sector)) {
            self.channels_all[channel] += 1;
            if is_random {
                self.channels_random[channel] += 1;
            }
        }
        for &sector in sectors {
            let count = above.iter().filter(|c| c.sector == sector).count() as f64;
            self.multiplicity_all.fill(count, sector as f64);
            if is_random {
                self.multiplicity_random.fill(count, sector as f64);
            }
        }
    }

    fn merge(&mut self, other: &AboveNoiseSnapshot) -> Result<(), CalibrationError> {
        self.channels_all.zip_apply(&other.channels_all, |a, b| *a += b);
        self.channels_random
            .zip_apply(&other.channels_random, |a, b| *a += b);
        self.multiplicity_all.add(&other.multiplicity_all)?;
        self.multiplicity_random.add(&other.multiplicity_random)
    }
}

/// Every diagnostic table of one worker (or of the merged pass)
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticHistograms {
    pub muon_signal: ChannelGrid<Histogram1D>,
    pub muon_signal_no_trigger: ChannelGrid<Histogram1D>,
    pub neighbour_noise: ChannelGrid<Histogram1D>,
    pub random_noise: ChannelGrid<Histogram1D>,
    /// (sector significance, sector), all events
    pub sector_significance_all: Histogram2D,
    /// (sector significance, sector), random-trigger events
    pub sector_significance_random: Histogram2D,
    /// (hottest, second-hottest sector significance)
    pub hottest_vs_second_all: Histogram2D,
    pub hottest_vs_second_random: Histogram2D,
    pub above_two_sigma: [AboveNoiseSnapshot; 3],
    /// Above-noise channels of every sector, after the hot-sector gates
    pub above_noise_all_channels: ChannelGrid<u64>,
    /// Above-noise channels of the muon sector, accepted with trigger
    pub muon_count_map: ChannelGrid<u64>,
    pub good_muons_per_sector: SectorGrid<u64>,
    /// Events accepted with trigger, per run
    pub runs_with_good_muons: BTreeMap<u32, u64>,
    /// Events past the hot-sector gates but not accepted with trigger, per run
    pub runs_all_trigger: BTreeMap<u32, u64>,
}

impl DiagnosticHistograms {
    pub fn new(config: &HistogramConfig) -> Self {
        let energy = || ChannelGrid::from_fn(|_| Histogram1D::new(config.energy));
        let significance_by_sector = || Histogram2D::new(config.significance, sector_axis());
        let hottest = || Histogram2D::new(config.significance, config.significance);
        Self {
            muon_signal: energy(),
            muon_signal_no_trigger: energy(),
            neighbour_noise: energy(),
            random_noise: energy(),
            sector_significance_all: significance_by_sector(),
            sector_significance_random: significance_by_sector(),
            hottest_vs_second_all: hottest(),
            hottest_vs_second_random: hottest(),
            above_two_sigma: [
                AboveNoiseSnapshot::new(),
                AboveNoiseSnapshot::new(),
                AboveNoiseSnapshot::new(),
            ],
            above_noise_all_channels: ChannelGrid::default(),
            muon_count_map: ChannelGrid::default(),
            good_muons_per_sector: [0; SECTORS],
            runs_with_good_muons: BTreeMap::new(),
            runs_all_trigger: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self, stage: SnapshotStage) -> &AboveNoiseSnapshot {
        &self.above_two_sigma[stage as usize]
    }

    /// Fill everything one complete-readout event contributes
    ///
    /// `noise_sigma` is the channel significance an above-2σ snapshot counts.
    pub fn record_event(
        &mut self,
        run: u32,
        energies: &EventEnergies,
        scores: &SignificanceScores,
        decision: &CascadeDecision,
        bad: &BadChannelSet,
        noise_sigma: f64,
    ) {
        let is_random = decision.is_random;

        if is_random {
            for (channel, energy) in energies.channels().iter() {
                if bad.is_good(channel) {
                    self.random_noise[channel].fill(*energy);
                }
            }
        }

        for (sector, sigma) in scores.sectors.iter().enumerate() {
            self.sector_significance_all.fill(*sigma, sector as f64);
            if is_random {
                self.sector_significance_random.fill(*sigma, sector as f64);
            }
        }
        let (hottest, second) = scores.hottest_two();
        self.hottest_vs_second_all.fill(hottest, second);
        if is_random {
            self.hottest_vs_second_random.fill(hottest, second);
        }

        let above = scores.channels_above(noise_sigma);
        let all_sectors: Vec<usize> = (0..SECTORS).collect();
        self.above_two_sigma[SnapshotStage::AllSectors as usize].record(
            &all_sectors,
            &above,
            is_random,
        );
        if decision.loose_sectors.len() != 1 {
            return;
        }
        self.above_two_sigma[SnapshotStage::LooseHotSector as usize].record(
            &decision.loose_sectors,
            &above,
            is_random,
        );

        let Some(muon_sector) = decision.muon_sector else {
            return;
        };
        self.above_two_sigma[SnapshotStage::MuonCandidate as usize].record(
            &decision.loose_sectors,
            &above,
            is_random,
        );

        let zone = muon_exclusion_zone(muon_sector);
        for (channel, energy) in energies.channels().iter() {
            if bad.is_good(channel) && !zone.contains(&channel.sector) {
                self.neighbour_noise[channel].fill(*energy);
            }
        }
        for &channel in &decision.above_noise {
            self.above_noise_all_channels[channel] += 1;
        }

        if decision.classification.is_accepted_with_trigger() {
            *self.runs_with_good_muons.entry(run).or_insert(0) += 1;
            self.good_muons_per_sector[muon_sector] += 1;
            for channel in Channel::in_sector(muon_sector).filter(|c| bad.is_good(*c)) {
                self.muon_signal[channel].fill(energies.channel(channel));
            }
            for channel in decision.muon_channels() {
                self.muon_count_map[channel] += 1;
            }
        } else {
            *self.runs_all_trigger.entry(run).or_insert(0) += 1;
        }

        if decision.classification.is_accepted() {
            for channel in Channel::in_sector(muon_sector).filter(|c| bad.is_good(*c)) {
                self.muon_signal_no_trigger[channel].fill(energies.channel(channel));
            }
        }
    }

    /// Bin-by-bin sum with another worker's tables
    pub fn merge(&mut self, other: &DiagnosticHistograms) -> Result<(), CalibrationError> {
        merge_grid(&mut self.muon_signal, &other.muon_signal)?;
        merge_grid(&mut self.muon_signal_no_trigger, &other.muon_signal_no_trigger)?;
        merge_grid(&mut self.neighbour_noise, &other.neighbour_noise)?;
        merge_grid(&mut self.random_noise, &other.random_noise)?;
        self.sector_significance_all
            .add(&other.sector_significance_all)?;
        self.sector_significance_random
            .add(&other.sector_significance_random)?;
        self.hottest_vs_second_all.add(&other.hottest_vs_second_all)?;
        self.hottest_vs_second_random
            .add(&other.hottest_vs_second_random)?;
        for (mine, theirs) in self
            .above_two_sigma
            .iter_mut()
            .zip(other.above_two_sigma.iter())
        {
            mine.merge(theirs)?;
        }
        self.above_noise_all_channels
            .zip_apply(&other.above_noise_all_channels, |a, b| *a += b);
        self.muon_count_map
            .zip_apply(&other.muon_count_map, |a, b| *a += b);
        for (a, b) in self
            .good_muons_per_sector
            .iter_mut()
            .zip(other.good_muons_per_sector.iter())
        {
            *a += b;
        }
        merge_runs(&mut self.runs_with_good_muons, &other.runs_with_good_muons);
        merge_runs(&mut self.runs_all_trigger, &other.runs_all_trigger);
        Ok(())
    }

    /// Divide the per-channel energy histograms by their stage counters
    ///
    /// Returns the number of divisions skipped because the divisor was zero.
    pub fn normalize(&mut self, counters: &EventCounters) -> usize {
        let mut skipped = 0;

        let random = counters.get(Stage::RandomTrigger);
        if random > 0 {
            scale_grid(&mut self.random_noise, 1.0 / random as f64);
        } else {
            log::debug!("No random events; random noise histograms left unscaled");
            skipped += 1;
        }

        let hot_sector = counters.get(Stage::SingleHotSector);
        if hot_sector > 0 {
            scale_grid(&mut self.neighbour_noise, 1.0 / hot_sector as f64);
        } else {
            log::debug!("No events past the hot-sector gates; neighbour noise left unscaled");
            skipped += 1;
        }

        for sector in 0..SECTORS {
            let muons = self.good_muons_per_sector[sector];
            if muons == 0 {
                skipped += 1;
                continue;
            }
            for channel in Channel::in_sector(sector) {
                self.muon_signal[channel].scale(1.0 / muons as f64);
            }
        }

        skipped
    }
}

fn merge_grid(
    mine: &mut ChannelGrid<Histogram1D>,
    theirs: &ChannelGrid<Histogram1D>,
) -> Result<(), CalibrationError> {
    let mut result = Ok(());
    mine.zip_apply(theirs, |a, b| {
        if result.is_ok() {
            result = a.add(b);
        }
    });
    result
}

fn scale_grid(grid: &mut ChannelGrid<Histogram1D>, factor: f64) {
    for (_, histogram) in grid.iter_mut() {
        histogram.scale(factor);
    }
}

fn merge_runs(mine: &mut BTreeMap<u32, u64>, theirs: &BTreeMap<u32, u64>) {
    for (run, count) in theirs {
        *mine.entry(*run).or_insert(0) += count;
    }
}
