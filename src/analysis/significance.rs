// Significance scorer - sigma scores of sector and channel energies
//
// sigma = (observed - baseline mean) / baseline RMS
//
// A zero RMS cannot be divided by; the score becomes
// sign(observed - mean) * ZERO_RMS_SENTINEL ("definitely triggered" when
// above the mean) and the site is reported back as degenerate. The scorer is
// pure: logging the degenerate sites is left to the caller.

use crate::analysis::energy::EventEnergies;
use crate::calibration::{BadChannelSet, BaselineStatistics, NoiseStats};
use crate::geometry::{Channel, ChannelGrid, SectorGrid, SECTORS};

/// Magnitude substituted for the significance of a zero-RMS site
pub const ZERO_RMS_SENTINEL: f64 = 1e9;

/// Starting value of the hottest-sector search
const NO_SECTOR_SIGMA: f64 = -1000.0;

/// Sector or channel whose baseline RMS is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreSite {
    Sector(usize),
    Channel(Channel),
}

/// sign(x) with sign(0) = 0
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Significance of `value` against `stats`, and whether the zero-RMS sentinel
/// was used
pub fn significance(value: f64, stats: NoiseStats) -> (f64, bool) {
    let delta = value - stats.mean;
    if stats.rms == 0.0 {
        (sign(delta) * ZERO_RMS_SENTINEL, true)
    } else {
        (delta / stats.rms, false)
    }
}

/// Sector and channel scores of one event
#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceScores {
    pub sectors: SectorGrid<f64>,
    /// `None` for bad channels
    pub channels: ChannelGrid<Option<f64>>,
    /// Sites scored with the zero-RMS sentinel
    pub degenerate: Vec<ScoreSite>,
}

impl SignificanceScores {
    pub fn sector(&self, sector: usize) -> f64 {
        self.sectors[sector]
    }

    pub fn channel(&self, channel: Channel) -> Option<f64> {
        self.channels[channel]
    }

    /// Sectors with significance strictly above `threshold`, ascending
    pub fn sectors_above(&self, threshold: f64) -> Vec<usize> {
        (0..SECTORS)
            .filter(|&s| self.sectors[s] > threshold)
            .collect()
    }

    /// Good channels with significance strictly above `threshold`
    pub fn channels_above(&self, threshold: f64) -> Vec<Channel> {
        self.channels
            .iter()
            .filter_map(|(c, sigma)| match sigma {
                Some(sigma) if *sigma > threshold => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Good channels of `sector` with significance above `threshold`
    pub fn count_in_sector_above(&self, sector: usize, threshold: f64) -> usize {
        self.channels
            .sector(sector)
            .iter()
            .filter(|sigma| matches!(sigma, Some(s) if *s > threshold))
            .count()
    }

    /// Highest and second-highest sector significance
    pub fn hottest_two(&self) -> (f64, f64) {
        let mut hottest = NO_SECTOR_SIGMA;
        let mut second = NO_SECTOR_SIGMA;
        for &sigma in self.sectors.iter() {
            if sigma > hottest {
                second = hottest;
                hottest = sigma;
            } else if sigma > second {
                second = sigma;
            }
        }
        (hottest, second)
    }
}

/// Scores events against a fixed baseline snapshot
#[derive(Debug, Clone, Copy)]
pub struct SignificanceScorer<'a> {
    baseline: &'a BaselineStatistics,
    bad: &'a BadChannelSet,
}

impl<'a> SignificanceScorer<'a> {
    pub fn new(baseline: &'a BaselineStatistics, bad: &'a BadChannelSet) -> Self {
        Self { baseline, bad }
    }

    pub fn score(&self, energies: &EventEnergies) -> SignificanceScores {
        let mut degenerate = Vec::new();

        let sectors = std::array::from_fn(|s| {
            let (sigma, zero_rms) = significance(energies.sector(s), self.baseline.sector(s));
            if zero_rms {
                degenerate.push(ScoreSite::Sector(s));
            }
            sigma
        });

        let channels = ChannelGrid::from_fn(|c| {
            if self.bad.contains(c) {
                return None;
            }
            let (sigma, zero_rms) = significance(energies.channel(c), self.baseline.channel(c));
            if zero_rms {
                degenerate.push(ScoreSite::Channel(c));
            }
            Some(sigma)
        });

        SignificanceScores {
            sectors,
            channels,
            degenerate,
        }
    }
}
