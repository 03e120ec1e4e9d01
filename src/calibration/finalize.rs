// Batch-end reduction: next-pass baselines and calibration factors
//
// Runs once per pass on the merged worker output:
// 1. Baselines from the random-trigger noise sums (fatal without random events)
// 2. Calibration factor per channel = mean accepted muon signal of the channel
//    divided by the mean of the reference channel, unless that mean is 0
// 3. Bad channels pinned to 1.0

use crate::calibration::accumulator::NoiseAccumulator;
use crate::calibration::bad_channels::BadChannelSet;
use crate::calibration::baseline::BaselineStatistics;
use crate::calibration::map::CalibrationMap;
use crate::error::CalibrationError;
use crate::geometry::{Channel, ChannelGrid};
use crate::histogram::Histogram1D;

/// Result of recomputing the calibration map
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationUpdate {
    pub map: CalibrationMap,
    /// Mean accepted muon signal of the reference channel
    pub reference_mean: f64,
    /// Whether factors were divided by `reference_mean`
    pub normalized: bool,
    /// Good channels without accepted signal; they keep their previous factor
    pub unfilled_channels: Vec<Channel>,
}

/// Baselines and calibration for the next pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassFinalization {
    pub baseline: BaselineStatistics,
    pub calibration: CalibrationUpdate,
}

/// Recompute calibration factors from accepted muon signal histograms
pub fn derive_calibration(
    muon_signal: &ChannelGrid<Histogram1D>,
    previous: &CalibrationMap,
    bad: &BadChannelSet,
    reference: Channel,
) -> CalibrationUpdate {
    let reference_mean = muon_signal[reference].mean();
    let normalized = reference_mean != 0.0;
    if !normalized {
        log::warn!(
            "Reference channel (sector {}, module {}) has no muon signal; factors not normalized",
            reference.sector,
            reference.module
        );
    }

    let mut unfilled_channels = Vec::new();
    let factors = ChannelGrid::from_fn(|channel| {
        if bad.contains(channel) {
            return 1.0;
        }
        let histogram = &muon_signal[channel];
        if histogram.integral() == 0.0 {
            unfilled_channels.push(channel);
            return previous.factor(channel);
        }
        let mean = histogram.mean();
        if normalized {
            mean / reference_mean
        } else {
            mean
        }
    });

    if !unfilled_channels.is_empty() {
        log::warn!(
            "{} channels without accepted muon signal keep their previous factor",
            unfilled_channels.len()
        );
    }

    CalibrationUpdate {
        map: CalibrationMap::from_grid(factors),
        reference_mean,
        normalized,
        unfilled_channels,
    }
}

/// Reduce a pass into the inputs of the next one
///
/// # Errors
/// `CalibrationError::NoRandomEvents` when the pass saw no random-trigger
/// event; nothing is produced in that case.
pub fn finalize_pass(
    noise: &NoiseAccumulator,
    muon_signal: &ChannelGrid<Histogram1D>,
    previous: &CalibrationMap,
    bad: &BadChannelSet,
    reference: Channel,
) -> Result<PassFinalization, CalibrationError> {
    let baseline = noise.reduce()?;
    let calibration = derive_calibration(muon_signal, previous, bad, reference);
    log::info!(
        "Finalized pass: {} random events, reference mean {:.3}",
        noise.random_events(),
        calibration.reference_mean
    );
    Ok(PassFinalization {
        baseline,
        calibration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Binning;

    fn empty_signal() -> ChannelGrid<Histogram1D> {
        ChannelGrid::from_fn(|_| Histogram1D::new(Binning::new(50, -100.0, 400.0)))
    }

    fn reference() -> Channel {
        Channel::new(8, 3).unwrap()
    }

    #[test]
    fn test_factors_divided_by_reference_mean() {
        let mut signal = empty_signal();
        signal[reference()].fill(20.0);
        signal[reference()].fill(40.0);
        let other = Channel::new(2, 5).unwrap();
        signal[other].fill(45.0);

        let update = derive_calibration(
            &signal,
            &CalibrationMap::unit(),
            &BadChannelSet::new(),
            reference(),
        );

        assert!(update.normalized);
        assert!((update.reference_mean - 30.0).abs() < 1e-12);
        assert!((update.map.factor(other) - 1.5).abs() < 1e-12);
        assert!((update.map.factor(reference()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_reference_mean_leaves_raw_mean() {
        let mut signal = empty_signal();
        let other = Channel::new(2, 5).unwrap();
        signal[other].fill(45.0);
        signal[other].fill(55.0);

        let update = derive_calibration(
            &signal,
            &CalibrationMap::unit(),
            &BadChannelSet::new(),
            reference(),
        );

        assert!(!update.normalized);
        assert_eq!(update.reference_mean, 0.0);
        assert_eq!(update.map.factor(other), signal[other].mean());
        assert!(update.map.factors().as_slice().iter().all(|f| f.is_finite()));
    }

    #[test]
    fn test_bad_channels_pinned_to_one() {
        let bad = BadChannelSet::from_module_sector_pairs([(5, 2), (3, 8)]).unwrap();
        let mut signal = empty_signal();
        signal[Channel::new(2, 5).unwrap()].fill(80.0);
        signal[Channel::new(4, 4).unwrap()].fill(10.0);

        let previous = CalibrationMap::from_grid(ChannelGrid::filled(0.5));
        let update = derive_calibration(&signal, &previous, &bad, reference());

        assert_eq!(update.map.factor(Channel::new(2, 5).unwrap()), 1.0);
        assert_eq!(update.map.factor(Channel::new(8, 3).unwrap()), 1.0);
        assert_eq!(update.map.factor(Channel::new(4, 4).unwrap()), 10.0);
    }

    #[test]
    fn test_unfilled_channels_keep_previous_factor() {
        let mut signal = empty_signal();
        signal[reference()].fill(10.0);
        let previous = CalibrationMap::from_grid(ChannelGrid::filled(0.8));

        let update = derive_calibration(&signal, &previous, &BadChannelSet::new(), reference());

        let untouched = Channel::new(0, 0).unwrap();
        assert_eq!(update.map.factor(untouched), 0.8);
        assert!(update.unfilled_channels.contains(&untouched));
        assert_eq!(update.unfilled_channels.len(), 223);
    }

    #[test]
    fn test_finalize_requires_random_events() {
        let result = finalize_pass(
            &NoiseAccumulator::new(),
            &empty_signal(),
            &CalibrationMap::unit(),
            &BadChannelSet::new(),
            reference(),
        );
        assert_eq!(result.unwrap_err(), CalibrationError::NoRandomEvents);
    }

    #[test]
    fn test_out_of_range_signal_counts_as_unfilled() {
        let mut signal = empty_signal();
        signal[reference()].fill(20.0);
        let overflowing = Channel::new(5, 7).unwrap();
        signal[overflowing].fill(900.0);
        let mut previous = CalibrationMap::unit();
        previous.set(overflowing, 1.7);

        let update = derive_calibration(&signal, &previous, &BadChannelSet::new(), reference());

        // Previous factor kept as is, not rescaled by the new reference mean
        assert_eq!(update.map.factor(overflowing), 1.7);
        assert!(update.unfilled_channels.contains(&overflowing));
        assert!(!update.unfilled_channels.contains(&reference()));
    }
}
