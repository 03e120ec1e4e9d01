// NoiseAccumulator - running sums over random-trigger events
//
// Every random-trigger event adds its good-channel and sector energies to a
// sum and a sum of squares. At the end of a pass the sums are reduced into
// the baseline statistics for the next pass:
//   mean = sum / n
//   rms  = sqrt(sum_sq / n - mean^2)

use crate::calibration::bad_channels::BadChannelSet;
use crate::calibration::baseline::{BaselineStatistics, NoiseStats};
use crate::error::CalibrationError;
use crate::geometry::{ChannelGrid, SectorGrid, SECTORS};

/// Sum and sum of squares of one quantity
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMoments {
    pub sum: f64,
    pub sum_sq: f64,
}

impl RunningMoments {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
    }

    pub fn merge(&mut self, other: &RunningMoments) {
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    /// Mean and RMS over `n` events; `n` must be positive
    pub fn reduce(&self, n: u64) -> NoiseStats {
        let n = n as f64;
        let mean = self.sum / n;
        // Rounding can push the variance a hair below zero for constant input
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        NoiseStats::new(mean, variance.sqrt())
    }
}

/// Per-channel and per-sector moments over random-trigger events
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseAccumulator {
    channels: ChannelGrid<RunningMoments>,
    sectors: SectorGrid<RunningMoments>,
    random_events: u64,
}

impl Default for NoiseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseAccumulator {
    pub fn new() -> Self {
        Self {
            channels: ChannelGrid::default(),
            sectors: [RunningMoments::default(); SECTORS],
            random_events: 0,
        }
    }

    /// Add one random-trigger event
    ///
    /// `sector_energies` must already exclude bad channels; bad channels are
    /// skipped here for the per-channel sums.
    pub fn record_event(
        &mut self,
        channel_energies: &ChannelGrid<f64>,
        sector_energies: &SectorGrid<f64>,
        bad: &BadChannelSet,
    ) {
        self.random_events += 1;
        for (channel, energy) in channel_energies.iter() {
            if bad.is_good(channel) {
                self.channels[channel].add(*energy);
            }
        }
        for (moments, energy) in self.sectors.iter_mut().zip(sector_energies.iter()) {
            moments.add(*energy);
        }
    }

    pub fn merge(&mut self, other: &NoiseAccumulator) {
        self.channels.zip_apply(&other.channels, |a, b| a.merge(b));
        for (a, b) in self.sectors.iter_mut().zip(other.sectors.iter()) {
            a.merge(b);
        }
        self.random_events += other.random_events;
    }

    pub fn random_events(&self) -> u64 {
        self.random_events
    }

    pub fn channel_moments(&self) -> &ChannelGrid<RunningMoments> {
        &self.channels
    }

    /// Reduce into next-pass baselines
    ///
    /// Does not consume or modify the sums, so repeated calls return the same
    /// statistics.
    ///
    /// # Errors
    /// `CalibrationError::NoRandomEvents` when no random-trigger event was
    /// recorded.
    pub fn reduce(&self) -> Result<BaselineStatistics, CalibrationError> {
        if self.random_events == 0 {
            return Err(CalibrationError::NoRandomEvents);
        }
        let n = self.random_events;
        let sectors = std::array::from_fn(|s| self.sectors[s].reduce(n));
        let channels = ChannelGrid::from_fn(|c| self.channels[c].reduce(n));
        Ok(BaselineStatistics::from_grids(sectors, channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Channel;

    fn record(acc: &mut NoiseAccumulator, channel: Channel, energy: f64, bad: &BadChannelSet) {
        let mut energies = ChannelGrid::filled(0.0);
        energies[channel] = energy;
        let mut sectors = [0.0; SECTORS];
        if bad.is_good(channel) {
            sectors[channel.sector] = energy;
        }
        acc.record_event(&energies, &sectors, bad);
    }

    #[test]
    fn test_reduce_one_to_ten() {
        let bad = BadChannelSet::new();
        let channel = Channel::new(0, 0).unwrap();
        let mut acc = NoiseAccumulator::new();
        for i in 1..=10 {
            record(&mut acc, channel, i as f64, &bad);
        }

        let baseline = acc.reduce().unwrap();
        let stats = baseline.channel(channel);
        assert!((stats.mean - 5.5).abs() < 1e-12);
        assert!((stats.rms - (38.5_f64 - 30.25).sqrt()).abs() < 1e-12);
        assert!((stats.rms - 2.8723).abs() < 1e-4);

        // Sector 0 only holds channel (0,0)
        assert!((baseline.sector(0).mean - 5.5).abs() < 1e-12);
        assert_eq!(baseline.sector(1), NoiseStats::default());
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let bad = BadChannelSet::new();
        let mut acc = NoiseAccumulator::new();
        for i in 0..7 {
            record(&mut acc, Channel::new(i % 16, i % 14).unwrap(), i as f64 * 1.3, &bad);
        }
        let first = acc.reduce().unwrap();
        let second = acc.reduce().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_random_events_is_fatal() {
        let acc = NoiseAccumulator::new();
        assert_eq!(acc.reduce().unwrap_err(), CalibrationError::NoRandomEvents);
    }

    #[test]
    fn test_bad_channels_not_accumulated() {
        let bad = BadChannelSet::from_module_sector_pairs([(2, 1)]).unwrap();
        let channel = Channel::new(1, 2).unwrap();
        let mut acc = NoiseAccumulator::new();
        record(&mut acc, channel, 50.0, &bad);

        let baseline = acc.reduce().unwrap();
        assert_eq!(baseline.channel(channel), NoiseStats::default());
        assert_eq!(baseline.sector(1), NoiseStats::default());
    }

    #[test]
    fn test_constant_input_has_zero_rms() {
        let bad = BadChannelSet::new();
        let channel = Channel::new(3, 3).unwrap();
        let mut acc = NoiseAccumulator::new();
        for _ in 0..3 {
            record(&mut acc, channel, 0.1, &bad);
        }
        let stats = acc.reduce().unwrap().channel(channel);
        assert_eq!(stats.rms, 0.0);
        assert!(!stats.rms.is_nan());
    }

    #[test]
    fn test_merge_matches_single_accumulator() {
        let bad = BadChannelSet::new();
        let channel = Channel::new(7, 9).unwrap();
        let mut all = NoiseAccumulator::new();
        let mut left = NoiseAccumulator::new();
        let mut right = NoiseAccumulator::new();
        for i in 0..6 {
            let energy = i as f64 * 2.0 - 3.0;
            record(&mut all, channel, energy, &bad);
            if i < 2 {
                record(&mut left, channel, energy, &bad);
            } else {
                record(&mut right, channel, energy, &bad);
            }
        }
        left.merge(&right);
        assert_eq!(left.random_events(), 6);
        assert_eq!(left.reduce().unwrap(), all.reduce().unwrap());
    }
}
