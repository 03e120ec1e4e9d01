use super::*;
use crate::analysis::significance::SignificanceScorer;
use crate::geometry::{ChannelGrid, CHANNELS};

/// Baseline with mean 0 and RMS 1 for every channel and sector
fn unit_baseline() -> BaselineStatistics {
    BaselineStatistics::from_tables(&[0.0; 16], &[1.0; 16], &[0.0; CHANNELS], &[1.0; CHANNELS])
        .unwrap()
}

/// Event energies with the listed (sector, module, energy) cells set
fn energies_with(cells: &[(usize, usize, f64)], bad: &BadChannelSet) -> EventEnergies {
    let mut channels = ChannelGrid::filled(0.0);
    for &(sector, module, energy) in cells {
        channels[Channel::new(sector, module).unwrap()] = energy;
    }
    EventEnergies::from_channel_energies(channels, bad)
}

/// Full-length muon track in `sector`
fn track(sector: usize, energy: f64) -> Vec<(usize, usize, f64)> {
    (0..14).map(|module| (sector, module, energy)).collect()
}

fn muon_trigger() -> TriggerFlags {
    TriggerFlags {
        halo_muon: true,
        ..Default::default()
    }
}

fn evaluate_with(
    config: &SelectionConfig,
    baseline: &BaselineStatistics,
    bad: &BadChannelSet,
    cells: &[(usize, usize, f64)],
    triggers: &TriggerFlags,
) -> CascadeDecision {
    let energies = energies_with(cells, bad);
    let scores = SignificanceScorer::new(baseline, bad).score(&energies);
    SelectionCascade::new(config, baseline, bad).evaluate(&energies, &scores, triggers)
}

fn evaluate(cells: &[(usize, usize, f64)], triggers: &TriggerFlags) -> CascadeDecision {
    evaluate_with(
        &SelectionConfig::default(),
        &unit_baseline(),
        &BadChannelSet::new(),
        cells,
        triggers,
    )
}

#[test]
fn test_single_track_accepted_without_trigger() {
    let decision = evaluate(&track(4, 10.0), &TriggerFlags::default());

    assert_eq!(decision.classification, Classification::AcceptedNoTrigger);
    assert_eq!(decision.muon_sector, Some(4));
    assert_eq!(decision.muon_channels().count(), 14);
    assert_eq!(
        decision.bands,
        Some(BandCoverage {
            front: true,
            mid: true,
            rear: true
        })
    );
    assert!(decision.classification.is_accepted());
    assert!(!decision.classification.is_accepted_with_trigger());
}

#[test]
fn test_single_track_accepted_with_trigger() {
    let decision = evaluate(&track(4, 10.0), &muon_trigger());
    assert_eq!(decision.classification, Classification::AcceptedWithTrigger);
    assert!(decision.has_trigger);
}

#[test]
fn test_two_hot_sectors_rejected_at_loose_gate() {
    let mut cells = track(4, 10.0);
    cells.extend(track(9, 10.0));

    let decision = evaluate(&cells, &muon_trigger());

    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::LooseHotSector)
    );
    assert_eq!(decision.loose_sectors, vec![4, 9]);
    assert_eq!(decision.muon_sector, None);
    assert!(decision.above_noise.is_empty());
}

#[test]
fn test_no_hot_sector_rejected_at_loose_gate() {
    let decision = evaluate(&[], &muon_trigger());
    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::LooseHotSector)
    );
    assert!(decision.loose_sectors.is_empty());
}

#[test]
fn test_second_warm_sector_rejected_at_tight_gate() {
    let mut cells = track(4, 10.0);
    cells.push((9, 0, 2.2));

    let decision = evaluate(&cells, &muon_trigger());

    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::TightHotSector)
    );
    assert_eq!(decision.loose_sectors, vec![4]);
    assert_eq!(decision.tight_sectors, vec![4, 9]);
    assert!(!decision.passed_hot_sector_gates());
}

#[test]
fn test_channel_multiplicity_threshold() {
    // Five above-noise channels are not enough in a regular sector
    let modules = [0, 4, 9, 10, 11];
    let cells: Vec<_> = modules.iter().map(|&m| (4, m, 10.0)).collect();
    let decision = evaluate(&cells, &muon_trigger());
    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::ChannelMultiplicity)
    );
    assert!(decision.passed_hot_sector_gates());
    assert!(!decision.passed_channel_multiplicity());

    // ...but pass in a relaxed sector
    let cells: Vec<_> = modules.iter().map(|&m| (6, m, 10.0)).collect();
    let decision = evaluate(&cells, &muon_trigger());
    assert_eq!(decision.classification, Classification::AcceptedWithTrigger);
}

#[test]
fn test_bad_channels_not_counted_above_noise() {
    let bad = BadChannelSet::from_module_sector_pairs([(2, 0)]).unwrap();
    let cells: Vec<_> = [0, 2, 4, 5, 9, 10].iter().map(|&m| (0, m, 10.0)).collect();

    let decision = evaluate_with(
        &SelectionConfig::default(),
        &unit_baseline(),
        &bad,
        &cells,
        &muon_trigger(),
    );

    assert_eq!(decision.muon_channels().count(), 5);
    assert!(!decision.above_noise.contains(&Channel::new(0, 2).unwrap()));
    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::ChannelMultiplicity)
    );
}

#[test]
fn test_band_gate_requires_all_three_bands() {
    // Mid and rear only
    let cells: Vec<_> = (4..14).map(|m| (4, m, 10.0)).collect();

    let decision = evaluate(&cells, &muon_trigger());
    assert_eq!(
        decision.classification,
        Classification::Rejected(RejectStage::BandCoverage)
    );
    assert_eq!(decision.bands.map(|b| b.count()), Some(2));

    let config = SelectionConfig {
        min_bands_with_hit: 2,
        ..SelectionConfig::default()
    };
    let decision = evaluate_with(
        &config,
        &unit_baseline(),
        &BadChannelSet::new(),
        &cells,
        &muon_trigger(),
    );
    assert_eq!(decision.classification, Classification::AcceptedWithTrigger);
}

#[test]
fn test_zero_rms_baseline_first_pass() {
    // Neutral baseline: any positive sector is "definitely triggered"
    let decision = evaluate_with(
        &SelectionConfig::default(),
        &BaselineStatistics::neutral(),
        &BadChannelSet::new(),
        &track(11, 0.5),
        &TriggerFlags::default(),
    );
    assert_eq!(decision.muon_sector, Some(11));
    assert_eq!(decision.classification, Classification::AcceptedNoTrigger);
}

#[test]
fn test_random_flag_recorded_without_rejecting() {
    let triggers = TriggerFlags {
        random: true,
        ..Default::default()
    };
    let decision = evaluate(&[], &triggers);
    assert!(decision.is_random);
    assert!(!decision.has_trigger);
}

#[test]
fn test_above_noise_covers_all_sectors() {
    // Wider sector RMS keeps the stray channel's sector below both gates
    let baseline =
        BaselineStatistics::from_tables(&[0.0; 16], &[2.0; 16], &[0.0; CHANNELS], &[1.0; CHANNELS])
            .unwrap();
    let mut cells = track(4, 10.0);
    cells.push((12, 3, 2.1));
    let decision = evaluate_with(
        &SelectionConfig::default(),
        &baseline,
        &BadChannelSet::new(),
        &cells,
        &TriggerFlags::default(),
    );

    assert_eq!(decision.muon_sector, Some(4));
    assert_eq!(decision.above_noise.len(), 15);
    assert!(decision.above_noise.contains(&Channel::new(12, 3).unwrap()));
    assert_eq!(decision.muon_channels().count(), 14);
}

#[test]
fn test_band_coverage_count() {
    assert_eq!(BandCoverage::from_modules(std::iter::empty()).count(), 0);
    assert_eq!(BandCoverage::from_modules([3, 8]).count(), 2);
    assert_eq!(BandCoverage::from_modules([0, 5, 13]).count(), 3);
}
