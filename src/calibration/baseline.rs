// BaselineStatistics - noise mean/RMS per channel and per sector
//
// Baselines come from the random-trigger events of the previous pass (or an
// initial table). They are read-only while events are processed; only the
// noise accumulator produces the values for the next pass.

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::geometry::{Channel, ChannelGrid, SectorGrid, CHANNELS, SECTORS};

/// Mean and RMS of a noise distribution
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseStats {
    pub mean: f64,
    pub rms: f64,
}

impl NoiseStats {
    pub fn new(mean: f64, rms: f64) -> Self {
        Self { mean, rms }
    }

    /// Energy above which a reading counts as `n_sigma` over noise
    pub fn threshold(&self, n_sigma: f64) -> f64 {
        self.mean + n_sigma * self.rms
    }
}

/// Per-channel and per-sector noise baselines
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineStatistics {
    sectors: SectorGrid<NoiseStats>,
    channels: ChannelGrid<NoiseStats>,
}

impl BaselineStatistics {
    /// All-zero baselines used on the very first pass
    pub fn neutral() -> Self {
        Self {
            sectors: [NoiseStats::default(); SECTORS],
            channels: ChannelGrid::filled(NoiseStats::default()),
        }
    }

    pub fn from_grids(sectors: SectorGrid<NoiseStats>, channels: ChannelGrid<NoiseStats>) -> Self {
        Self { sectors, channels }
    }

    /// Build from the four flat tables (sector tables indexed by sector,
    /// channel tables by `sector * 14 + module`)
    pub fn from_tables(
        sector_mean: &[f64],
        sector_rms: &[f64],
        channel_mean: &[f64],
        channel_rms: &[f64],
    ) -> Result<Self, CalibrationError> {
        check_len("hist_sec_Mean", sector_mean, SECTORS)?;
        check_len("hist_sec_RMS", sector_rms, SECTORS)?;
        check_len("hist_ch_Mean", channel_mean, CHANNELS)?;
        check_len("hist_ch_RMS", channel_rms, CHANNELS)?;

        let sectors = std::array::from_fn(|s| NoiseStats::new(sector_mean[s], sector_rms[s]));
        let channels = ChannelGrid::from_fn(|c| {
            let i = c.linear_index();
            NoiseStats::new(channel_mean[i], channel_rms[i])
        });
        Ok(Self { sectors, channels })
    }

    pub fn sector(&self, sector: usize) -> NoiseStats {
        self.sectors[sector]
    }

    pub fn channel(&self, channel: Channel) -> NoiseStats {
        self.channels[channel]
    }

    pub fn sectors(&self) -> &SectorGrid<NoiseStats> {
        &self.sectors
    }

    pub fn channels(&self) -> &ChannelGrid<NoiseStats> {
        &self.channels
    }

    pub fn sector_means(&self) -> Vec<f64> {
        self.sectors.iter().map(|s| s.mean).collect()
    }

    pub fn sector_rms(&self) -> Vec<f64> {
        self.sectors.iter().map(|s| s.rms).collect()
    }

    pub fn channel_means(&self) -> Vec<f64> {
        self.channels.as_slice().iter().map(|s| s.mean).collect()
    }

    pub fn channel_rms(&self) -> Vec<f64> {
        self.channels.as_slice().iter().map(|s| s.rms).collect()
    }
}

fn check_len(table: &str, values: &[f64], expected: usize) -> Result<(), CalibrationError> {
    if values.len() != expected {
        return Err(CalibrationError::TableShape {
            table: table.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(())
}
