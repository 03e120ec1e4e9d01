use std::path::PathBuf;
use std::sync::Arc;

use halo_muon_selection::analysis::Stage;
use halo_muon_selection::calibration::BadChannelSet;
use halo_muon_selection::fixtures::synthetic::{SyntheticConfig, SyntheticGenerator};
use halo_muon_selection::geometry::{Channel, SECTORS};
use halo_muon_selection::{run_pass, AppConfig, PassStore};

fn temp_store(name: &str) -> PassStore {
    let root: PathBuf = std::env::temp_dir().join(format!(
        "halo_muon_it_{}_{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&root);
    PassStore::new(root)
}

fn generator() -> SyntheticGenerator {
    let config = SyntheticConfig {
        events: 2000,
        ..SyntheticConfig::default()
    };
    SyntheticGenerator::new(config, 42).unwrap()
}

#[test]
fn two_passes_recover_baselines_and_gains() {
    let mut generator = generator();
    let events = generator.generate();
    let store = temp_store("two_passes");
    let config = AppConfig::default();

    // Pass 0: neutral baselines, nothing accepted yet
    let (pass, inputs) = store.load_inputs(BadChannelSet::new(), &config).unwrap();
    assert_eq!(pass, 0);
    let first = run_pass(Arc::new(inputs), &events, 4).unwrap();
    store.write_pass(pass, &first).unwrap();

    let counts = first.counters.slots();
    assert_eq!(counts[0], 2000);
    assert!(counts[1] < counts[0], "malformed events must be dropped");
    assert!(counts[2] > 400);
    assert_eq!(first.malformed_events, counts[0] - counts[1]);

    // Pedestal noise is N(0, 1) per channel
    for stats in first.baseline.channels().as_slice() {
        assert!(stats.mean.abs() < 0.35, "channel mean {}", stats.mean);
        assert!((0.7..1.3).contains(&stats.rms), "channel rms {}", stats.rms);
    }
    for sector in 0..SECTORS {
        let rms = first.baseline.sector(sector).rms;
        assert!((3.0..4.5).contains(&rms), "sector {} rms {}", sector, rms);
    }

    // Pass 1 reads the tables written by pass 0
    let (pass, inputs) = store.load_inputs(BadChannelSet::new(), &config).unwrap();
    assert_eq!(pass, 1);
    let second = run_pass(Arc::new(inputs), &events, 3).unwrap();
    store.write_pass(pass, &second).unwrap();

    let counts = second.counters.slots();
    let stage = |s: Stage| second.counters.get(s);
    assert!(stage(Stage::SingleHotSector) >= stage(Stage::ChannelMultiplicity));
    assert!(stage(Stage::ChannelMultiplicity) >= stage(Stage::Accepted));
    assert!(stage(Stage::Accepted) >= stage(Stage::AcceptedWithTrigger));
    assert!(stage(Stage::MuonTrigger) >= stage(Stage::AcceptedWithTrigger));
    assert!(stage(Stage::AcceptedWithTrigger) > 100, "counters: {:?}", counts);
    assert_eq!(second.accepted.len() as u64, second.counters.get(Stage::Accepted));

    let update = &second.calibration;
    assert!(update.normalized);
    let reference = config.selection.reference_channel;
    assert!((update.map.factor(reference) - 1.0).abs() < 1e-9);

    let gains = generator.gains();
    for channel in Channel::all() {
        let expected = gains[channel] / gains[reference];
        let found = update.map.factor(channel);
        assert!(
            (found - expected).abs() < 0.3,
            "channel {:?}: factor {} vs gain ratio {}",
            channel,
            found,
            expected
        );
    }

    assert_eq!(store.existing_passes().unwrap(), vec![0, 1]);
    let stored = store.load_pass(1).unwrap();
    assert_eq!(stored.counters().unwrap(), second.counters);
    let summary = stored.summary.unwrap();
    assert_eq!(summary.event_count, *second.counters.slots());
    assert_eq!(summary.accepted_events, second.accepted.len());
    let _ = std::fs::remove_dir_all(store.root());
}

#[test]
fn bad_channels_stay_at_unit_factor() {
    let events = generator().generate();
    let store = temp_store("bad_channels");
    let config = AppConfig::default();
    let bad = BadChannelSet::from_module_sector_pairs([(4, 2), (0, 9)]).unwrap();

    let mut last = None;
    for _ in 0..2 {
        let (pass, inputs) = store.load_inputs(bad.clone(), &config).unwrap();
        let report = run_pass(Arc::new(inputs), &events, 2).unwrap();
        store.write_pass(pass, &report).unwrap();
        last = Some(report);
    }
    let last = last.unwrap();

    let calibration = store.load_pass(1).unwrap().calibration().unwrap();
    for channel in bad.sorted() {
        assert_eq!(calibration.factor(channel), 1.0);
        assert_eq!(last.diagnostics.random_noise[channel].entries(), 0);
        assert_eq!(last.diagnostics.muon_signal[channel].entries(), 0);
    }
    assert!(!last.accepted.is_empty());
    for event in &last.accepted {
        for channel in bad.sorted() {
            assert_eq!(event.energy(channel), 0.0);
        }
    }
    let _ = std::fs::remove_dir_all(store.root());
}
