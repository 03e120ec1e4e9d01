//! Builders for deterministic events and pass inputs.
//!
//! Only compiled for unit tests or when the `test_support` Cargo feature is
//! enabled, so the production build carries none of it.

use crate::analysis::{EventId, EventRecord, Hit, TriggerFlags};
use crate::calibration::{BadChannelSet, BaselineStatistics};
use crate::config::AppConfig;
use crate::context::PassInputs;
use crate::geometry::{Channel, ChannelGrid, CHANNELS, SECTORS};

/// Event record with one hit per channel, energies taken from `energies`
pub fn event_from_grid(id: EventId, energies: &ChannelGrid<f64>, triggers: TriggerFlags) -> EventRecord {
    let hits = energies
        .iter()
        .map(|(channel, energy)| Hit {
            sector: channel.sector as u32 + 1,
            module: channel.module as u32 + 1,
            energy: *energy,
        })
        .collect();
    EventRecord {
        id,
        hits,
        triggers,
    }
}

/// Quiet detector except a full-length track of `energy` in `sector`
pub fn muon_event(run: u32, event: u64, sector: usize, energy: f64, triggered: bool) -> EventRecord {
    let energies = ChannelGrid::from_fn(|c| if c.sector == sector { energy } else { 0.0 });
    let triggers = TriggerFlags {
        halo_muon: triggered,
        ..Default::default()
    };
    event_from_grid(
        EventId {
            run,
            lumi: 1,
            event,
        },
        &energies,
        triggers,
    )
}

/// Every channel at `energy`; `random` sets the beam-free random trigger
pub fn noise_event(run: u32, event: u64, energy: f64, random: bool) -> EventRecord {
    let triggers = TriggerFlags {
        random,
        ..Default::default()
    };
    event_from_grid(
        EventId {
            run,
            lumi: 1,
            event,
        },
        &ChannelGrid::filled(energy),
        triggers,
    )
}

/// Baseline with mean 0 and RMS 1 for every channel and sector
pub fn unit_baseline() -> BaselineStatistics {
    BaselineStatistics::from_tables(
        &[0.0; SECTORS],
        &[1.0; SECTORS],
        &[0.0; CHANNELS],
        &[1.0; CHANNELS],
    )
    .unwrap_or_else(|_| BaselineStatistics::neutral())
}

/// Default-config pass inputs on top of [`unit_baseline`]
pub fn unit_baseline_inputs() -> PassInputs {
    PassInputs::new(
        unit_baseline(),
        Default::default(),
        BadChannelSet::new(),
        &AppConfig::default(),
    )
}

/// Channel shorthand for tests; panics on out-of-range coordinates
pub fn ch(sector: usize, module: usize) -> Channel {
    Channel::new(sector, module).unwrap_or_else(|| panic!("no channel ({}, {})", sector, module))
}
