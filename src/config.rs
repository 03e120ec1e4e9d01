//! Configuration management for selection thresholds
//!
//! This module provides runtime configuration loading from JSON files so the
//! cascade thresholds, histogram binning and worker count can be tuned
//! without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::geometry::Channel;
use crate::histogram::Binning;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub histograms: HistogramConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Selection cascade thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Loose single-hot-sector gate: sector significance threshold
    pub loose_sector_sigma: f64,
    /// Tight single-hot-sector gate: sector significance threshold
    pub tight_sector_sigma: f64,
    /// A channel is above noise when energy > mean + this * RMS
    pub channel_noise_sigma: f64,
    /// Muon sector passes with strictly more above-noise channels than this
    pub min_channels_above_noise: usize,
    /// Same, for the sectors in `relaxed_sectors`
    pub relaxed_min_channels_above_noise: usize,
    /// Sectors with lower channel yield
    pub relaxed_sectors: Vec<usize>,
    /// Number of module bands (front, mid, rear) that must hold a hit
    pub min_bands_with_hit: usize,
    /// Channel all calibration factors are normalized to
    pub reference_channel: Channel,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            loose_sector_sigma: 2.5,
            tight_sector_sigma: 2.0,
            channel_noise_sigma: 2.0,
            min_channels_above_noise: 5,
            relaxed_min_channels_above_noise: 4,
            relaxed_sectors: vec![6, 7, 10, 11, 12, 13],
            // All three bands; see DESIGN.md on the band coverage gate
            min_bands_with_hit: 3,
            reference_channel: Channel {
                sector: 8,
                module: 3,
            },
        }
    }
}

impl SelectionConfig {
    /// Above-noise channel count needed (strictly exceeded) in `sector`
    pub fn channel_threshold(&self, sector: usize) -> usize {
        if self.relaxed_sectors.contains(&sector) {
            self.relaxed_min_channels_above_noise
        } else {
            self.min_channels_above_noise
        }
    }
}

/// Diagnostic histogram binning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Per-channel energy histograms (signal and noise)
    pub energy: Binning,
    /// Sector significance distributions
    pub significance: Binning,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            energy: Binning::new(50, -100.0, 400.0),
            significance: Binning::new(100, -50.0, 450.0),
        }
    }
}

/// Pass execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads per pass
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { workers: 8 }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults when the file is missing or
    /// invalid (a warning is logged).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
