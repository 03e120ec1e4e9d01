// BadChannelSet - externally supplied list of channels excluded from
// every sum, score, accumulator and calibration update.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{CalibrationError, StoreError};
use crate::geometry::Channel;

/// Set of known-bad channels with O(1) membership tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BadChannelSet {
    channels: HashSet<Channel>,
}

impl BadChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from 0-based `(module, sector)` pairs, the order the external
    /// bad-channel lists use
    pub fn from_module_sector_pairs<I>(pairs: I) -> Result<Self, CalibrationError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut channels = HashSet::new();
        for (module, sector) in pairs {
            let channel = Channel::new(sector, module)
                .ok_or(CalibrationError::ChannelOutOfRange { sector, module })?;
            channels.insert(channel);
        }
        Ok(Self { channels })
    }

    /// Load a JSON list of `[module, sector]` pairs
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let display = path.as_ref().display().to_string();
        let contents = fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let pairs: Vec<(usize, usize)> =
            serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
                path: display.clone(),
                reason: e.to_string(),
            })?;
        let set = Self::from_module_sector_pairs(pairs).map_err(|source| {
            StoreError::InvalidTables {
                path: display.clone(),
                source,
            }
        })?;
        log::info!("Loaded {} bad channels from {}", set.len(), display);
        Ok(set)
    }

    pub fn insert(&mut self, channel: Channel) {
        self.channels.insert(channel);
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    pub fn is_good(&self, channel: Channel) -> bool {
        !self.contains(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in sector-major order
    pub fn sorted(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.iter().copied().collect();
        channels.sort();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_module_then_sector() {
        let set = BadChannelSet::from_module_sector_pairs([(5, 2), (13, 15)]).unwrap();
        assert!(set.contains(Channel::new(2, 5).unwrap()));
        assert!(set.contains(Channel::new(15, 13).unwrap()));
        assert!(set.is_good(Channel::new(5, 2).unwrap()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_out_of_range_pair_rejected() {
        let result = BadChannelSet::from_module_sector_pairs([(14, 0)]);
        assert_eq!(
            result.unwrap_err(),
            CalibrationError::ChannelOutOfRange {
                sector: 0,
                module: 14
            }
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = BadChannelSet::load_from_file("/nonexistent/bad_channels.json").unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
