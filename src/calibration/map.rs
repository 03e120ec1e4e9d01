// CalibrationMap - per-channel multiplicative energy correction
//
// Starts at 1.0 everywhere on the first pass and is rewritten once per pass
// at finalization. Bad channels are pinned to exactly 1.0.

use crate::calibration::bad_channels::BadChannelSet;
use crate::error::CalibrationError;
use crate::geometry::{Channel, ChannelGrid, MODULES, SECTORS};

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMap {
    factors: ChannelGrid<f64>,
}

impl Default for CalibrationMap {
    fn default() -> Self {
        Self::unit()
    }
}

impl CalibrationMap {
    /// Every factor 1.0
    pub fn unit() -> Self {
        Self {
            factors: ChannelGrid::filled(1.0),
        }
    }

    pub fn from_grid(factors: ChannelGrid<f64>) -> Self {
        Self { factors }
    }

    /// Build from a module x sector table (14 rows of 16 factors)
    pub fn from_module_sector_table(rows: &[Vec<f64>]) -> Result<Self, CalibrationError> {
        if rows.len() != MODULES {
            return Err(CalibrationError::TableShape {
                table: "2DMuonSignalMap".to_string(),
                expected: MODULES,
                found: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|row| row.len() != SECTORS) {
            return Err(CalibrationError::TableShape {
                table: "2DMuonSignalMap".to_string(),
                expected: SECTORS,
                found: row.len(),
            });
        }
        Ok(Self {
            factors: ChannelGrid::from_fn(|c| rows[c.module][c.sector]),
        })
    }

    /// Inverse of [`CalibrationMap::from_module_sector_table`]
    pub fn to_module_sector_table(&self) -> Vec<Vec<f64>> {
        (0..MODULES)
            .map(|module| {
                (0..SECTORS)
                    .map(|sector| self.factors[Channel { sector, module }])
                    .collect()
            })
            .collect()
    }

    pub fn factor(&self, channel: Channel) -> f64 {
        self.factors[channel]
    }

    pub fn set(&mut self, channel: Channel, factor: f64) {
        self.factors[channel] = factor;
    }

    /// Corrected energy for a raw reading
    pub fn apply(&self, channel: Channel, raw: f64) -> f64 {
        self.factors[channel] * raw
    }

    /// Force bad channels to 1.0; returns how many entries changed
    pub fn pin_bad_channels(&mut self, bad: &BadChannelSet) -> usize {
        let mut changed = 0;
        for (channel, factor) in self.factors.iter_mut() {
            if bad.contains(channel) && *factor != 1.0 {
                *factor = 1.0;
                changed += 1;
            }
        }
        changed
    }

    pub fn factors(&self) -> &ChannelGrid<f64> {
        &self.factors
    }
}
