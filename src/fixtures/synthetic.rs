//! Seeded synthetic event generator.
//!
//! Produces a reproducible mix of event kinds for exercising full passes
//! without detector data:
//! - random-trigger events: pedestal noise only
//! - halo muons: one sector with a deposit in every module, scaled by a fixed
//!   per-channel gain so iterated calibration has something to recover
//! - beam events: noise plus showers in several sectors
//! - incomplete readouts: a few hits missing

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use serde::{Deserialize, Serialize};

use crate::analysis::event::{L1_HALO_MUON_ALGO, TECH_BPTX_MINUS, TECH_BPTX_PLUS};
use crate::analysis::{EventId, EventRecord, Hit, TriggerFlags};
use crate::geometry::{Channel, ChannelGrid, SECTORS};

const TECHNICAL_BITS: usize = 64;
const L1_ALGO_BITS: usize = 128;

/// Event mix and detector response of the generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub events: usize,
    pub run: u32,
    /// Share of random-trigger events
    pub random_fraction: f64,
    /// Share of halo-muon events
    pub muon_fraction: f64,
    /// Share of incomplete readouts
    pub malformed_fraction: f64,
    /// Probability that a muon fires the halo-muon trigger
    pub trigger_efficiency: f64,
    pub noise_mean: f64,
    pub noise_rms: f64,
    /// Mean muon deposit per module before gain
    pub muon_energy: f64,
    /// Relative spread of the true channel gains around 1.0
    pub gain_spread: f64,
    /// Mean shower energy per hit channel of a beam event
    pub shower_energy: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            events: 1000,
            run: 247_324,
            random_fraction: 0.3,
            muon_fraction: 0.2,
            malformed_fraction: 0.01,
            trigger_efficiency: 0.9,
            noise_mean: 0.0,
            noise_rms: 1.0,
            muon_energy: 25.0,
            gain_spread: 0.2,
            shower_energy: 15.0,
        }
    }
}

/// Relative spread of a single muon deposit around its mean
const DEPOSIT_SPREAD: f64 = 0.2;

pub struct SyntheticGenerator {
    config: SyntheticConfig,
    rng: StdRng,
    gains: ChannelGrid<f64>,
    pedestal: Normal<f64>,
    deposit: Normal<f64>,
}

impl SyntheticGenerator {
    /// # Errors
    /// `NormalError` when `noise_rms` or `muon_energy` do not describe a
    /// valid normal distribution (negative or non-finite width).
    pub fn new(config: SyntheticConfig, seed: u64) -> Result<Self, NormalError> {
        let pedestal = Normal::new(config.noise_mean, config.noise_rms)?;
        let deposit = Normal::new(config.muon_energy, DEPOSIT_SPREAD * config.muon_energy.abs())?;
        let mut rng = StdRng::seed_from_u64(seed);
        let spread = config.gain_spread.abs();
        let gains = ChannelGrid::from_fn(|_| {
            if spread > 0.0 {
                1.0 + rng.gen_range(-spread..spread)
            } else {
                1.0
            }
        });
        Ok(Self {
            config,
            rng,
            gains,
            pedestal,
            deposit,
        })
    }

    /// True gain of every channel
    pub fn gains(&self) -> &ChannelGrid<f64> {
        &self.gains
    }

    pub fn generate(&mut self) -> Vec<EventRecord> {
        (0..self.config.events)
            .map(|i| self.next_event(i as u64 + 1))
            .collect()
    }

    fn next_event(&mut self, event: u64) -> EventRecord {
        let id = EventId {
            run: self.config.run,
            lumi: (event / 1000) as u32 + 1,
            event,
        };

        let roll: f64 = self.rng.gen();
        let mut record = if roll < self.config.random_fraction {
            self.random_event(id)
        } else if roll < self.config.random_fraction + self.config.muon_fraction {
            self.muon_event(id)
        } else {
            self.beam_event(id)
        };

        if self.rng.gen_bool(self.config.malformed_fraction.clamp(0.0, 1.0)) {
            let keep = self.rng.gen_range(0..record.hits.len());
            record.hits.truncate(keep);
        }
        record
    }

    fn noise(&mut self) -> ChannelGrid<f64> {
        let pedestal = self.pedestal;
        ChannelGrid::from_fn(|_| pedestal.sample(&mut self.rng))
    }

    fn random_event(&mut self, id: EventId) -> EventRecord {
        let energies = self.noise();
        let triggers = TriggerFlags {
            random: true,
            technical: vec![false; TECHNICAL_BITS],
            halo_muon: false,
            l1_algo: vec![false; L1_ALGO_BITS],
        };
        to_record(id, &energies, triggers)
    }

    fn muon_event(&mut self, id: EventId) -> EventRecord {
        let mut energies = self.noise();
        let sector = self.rng.gen_range(0..SECTORS);
        for channel in Channel::in_sector(sector) {
            let deposit = self.deposit.sample(&mut self.rng);
            energies[channel] += self.gains[channel] * deposit.max(0.0);
        }

        let triggered = self.rng.gen_bool(self.config.trigger_efficiency.clamp(0.0, 1.0));
        let mut l1_algo = vec![false; L1_ALGO_BITS];
        // Half of the triggered muons come through the level-1 algorithm
        let via_l1 = triggered && self.rng.gen_bool(0.5);
        l1_algo[L1_HALO_MUON_ALGO] = via_l1;

        let triggers = TriggerFlags {
            random: false,
            technical: vec![false; TECHNICAL_BITS],
            halo_muon: triggered && !via_l1,
            l1_algo,
        };
        to_record(id, &energies, triggers)
    }

    fn beam_event(&mut self, id: EventId) -> EventRecord {
        let mut energies = self.noise();
        let showers = self.rng.gen_range(2..=5);
        for _ in 0..showers {
            let sector = self.rng.gen_range(0..SECTORS);
            let depth = self.rng.gen_range(1..=6);
            for channel in Channel::in_sector(sector).take(depth) {
                energies[channel] += self.config.shower_energy * self.rng.gen_range(0.5..1.5);
            }
        }

        let mut technical = vec![false; TECHNICAL_BITS];
        technical[TECH_BPTX_PLUS] = true;
        technical[TECH_BPTX_MINUS] = true;
        let triggers = TriggerFlags {
            // Random triggers in colliding bunches are not noise samples
            random: self.rng.gen_bool(0.1),
            technical,
            halo_muon: false,
            l1_algo: vec![false; L1_ALGO_BITS],
        };
        to_record(id, &energies, triggers)
    }
}

fn to_record(id: EventId, energies: &ChannelGrid<f64>, triggers: TriggerFlags) -> EventRecord {
    let hits = energies
        .iter()
        .map(|(channel, energy)| Hit {
            sector: channel.sector as u32 + 1,
            module: channel.module as u32 + 1,
            energy: *energy,
        })
        .collect();
    EventRecord { id, hits, triggers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CHANNELS;

    #[test]
    fn test_same_seed_same_events() {
        let config = SyntheticConfig {
            events: 50,
            ..SyntheticConfig::default()
        };
        let a = SyntheticGenerator::new(config.clone(), 11).unwrap().generate();
        let b = SyntheticGenerator::new(config, 11).unwrap().generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_mix() {
        let config = SyntheticConfig {
            events: 2000,
            malformed_fraction: 0.0,
            ..SyntheticConfig::default()
        };
        let events = SyntheticGenerator::new(config, 3).unwrap().generate();

        assert!(events.iter().all(|e| e.hits.len() == CHANNELS));
        let random = events
            .iter()
            .filter(|e| e.triggers.is_random_trigger())
            .count();
        // 30% random, beam-time random triggers excluded by the bptx bits
        assert!((450..750).contains(&random), "random events: {}", random);
        assert!(events.iter().any(|e| e.triggers.has_muon_trigger()));
        assert_eq!(events[9].id.event, 10);
    }

    #[test]
    fn test_gains_within_spread() {
        let generator = SyntheticGenerator::new(SyntheticConfig::default(), 5).unwrap();
        assert!(generator
            .gains()
            .as_slice()
            .iter()
            .all(|g| (0.8..=1.2).contains(g)));
    }

    #[test]
    fn test_negative_noise_rms_rejected() {
        let config = SyntheticConfig {
            noise_rms: -1.0,
            ..SyntheticConfig::default()
        };
        assert!(SyntheticGenerator::new(config, 1).is_err());
    }

    #[test]
    fn test_pedestal_follows_configured_noise() {
        let config = SyntheticConfig {
            events: 400,
            random_fraction: 1.0,
            malformed_fraction: 0.0,
            noise_mean: 3.0,
            noise_rms: 0.5,
            ..SyntheticConfig::default()
        };
        let events = SyntheticGenerator::new(config, 13).unwrap().generate();
        let energies: Vec<f64> = events
            .iter()
            .flat_map(|e| e.hits.iter().map(|h| h.energy))
            .collect();
        let n = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / n;
        let rms = (energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!((mean - 3.0).abs() < 0.01, "mean {}", mean);
        assert!((rms - 0.5).abs() < 0.01, "rms {}", rms);
    }
}
