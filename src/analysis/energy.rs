// Calibrated channel and sector energies of one event
//
// Built fresh for every event from the raw hits:
//   channel energy = calibration factor * raw energy
//   sector energy  = sum of good-channel energies of the sector
//   front energy   = same sum restricted to the front band (modules 0-3)

use std::fmt;

use crate::analysis::event::EventRecord;
use crate::calibration::{BadChannelSet, CalibrationMap};
use crate::geometry::{Channel, ChannelGrid, ModuleBand, SectorGrid, CHANNELS, SECTORS};

/// Why an event was dropped at the readout-completeness stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MalformedEvent {
    /// Readout does not hold one hit per channel
    HitCount { found: usize },
    /// Hit with 1-based coordinates outside the detector
    OutOfRange { sector: u32, module: u32 },
    /// Two hits for the same channel
    DuplicateChannel(Channel),
}

impl fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedEvent::HitCount { found } => {
                write!(f, "expected {} hits, found {}", CHANNELS, found)
            }
            MalformedEvent::OutOfRange { sector, module } => {
                write!(f, "hit at sector {} module {} outside detector", sector, module)
            }
            MalformedEvent::DuplicateChannel(channel) => write!(
                f,
                "duplicate hit for sector {} module {}",
                channel.sector, channel.module
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventEnergies {
    channels: ChannelGrid<f64>,
    sectors: SectorGrid<f64>,
    front_sectors: SectorGrid<f64>,
}

impl EventEnergies {
    /// Calibrate the hits of `record` and build the sector sums
    pub fn from_record(
        record: &EventRecord,
        calibration: &CalibrationMap,
        bad: &BadChannelSet,
    ) -> Result<Self, MalformedEvent> {
        if record.hits.len() != CHANNELS {
            return Err(MalformedEvent::HitCount {
                found: record.hits.len(),
            });
        }

        let mut channels = ChannelGrid::filled(0.0);
        let mut seen = ChannelGrid::filled(false);
        for hit in &record.hits {
            let channel = Channel::from_detector(hit.sector, hit.module).ok_or(
                MalformedEvent::OutOfRange {
                    sector: hit.sector,
                    module: hit.module,
                },
            )?;
            if seen[channel] {
                return Err(MalformedEvent::DuplicateChannel(channel));
            }
            seen[channel] = true;
            channels[channel] = calibration.apply(channel, hit.energy);
        }

        Ok(Self::from_channel_energies(channels, bad))
    }

    /// Build sector sums from already calibrated channel energies
    pub fn from_channel_energies(channels: ChannelGrid<f64>, bad: &BadChannelSet) -> Self {
        let mut sectors = [0.0; SECTORS];
        let mut front_sectors = [0.0; SECTORS];
        for (channel, energy) in channels.iter() {
            if bad.contains(channel) {
                continue;
            }
            sectors[channel.sector] += energy;
            if ModuleBand::Front.contains(channel.module) {
                front_sectors[channel.sector] += energy;
            }
        }
        Self {
            channels,
            sectors,
            front_sectors,
        }
    }

    pub fn channel(&self, channel: Channel) -> f64 {
        self.channels[channel]
    }

    pub fn channels(&self) -> &ChannelGrid<f64> {
        &self.channels
    }

    pub fn sector(&self, sector: usize) -> f64 {
        self.sectors[sector]
    }

    pub fn sectors(&self) -> &SectorGrid<f64> {
        &self.sectors
    }

    /// Front-band (modules 0-3) sector energies
    pub fn front_sectors(&self) -> &SectorGrid<f64> {
        &self.front_sectors
    }

    /// Channel energies with bad channels set to zero
    pub fn masked(&self, bad: &BadChannelSet) -> ChannelGrid<f64> {
        ChannelGrid::from_fn(|c| if bad.contains(c) { 0.0 } else { self.channels[c] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::event::{EventId, Hit, TriggerFlags};

    fn record_with(energy: impl Fn(Channel) -> f64) -> EventRecord {
        let hits = Channel::all()
            .map(|c| Hit {
                sector: c.sector as u32 + 1,
                module: c.module as u32 + 1,
                energy: energy(c),
            })
            .collect();
        EventRecord {
            id: EventId::default(),
            hits,
            triggers: TriggerFlags::default(),
        }
    }

    #[test]
    fn test_calibration_applied_and_bad_channels_excluded_from_sums() {
        let record = record_with(|_| 2.0);
        let mut calibration = CalibrationMap::unit();
        calibration.set(Channel::new(4, 0).unwrap(), 1.5);
        let bad = BadChannelSet::from_module_sector_pairs([(6, 4)]).unwrap();

        let energies = EventEnergies::from_record(&record, &calibration, &bad).unwrap();

        assert_eq!(energies.channel(Channel::new(4, 0).unwrap()), 3.0);
        // Bad channel keeps its energy but is not summed
        assert_eq!(energies.channel(Channel::new(4, 6).unwrap()), 2.0);
        assert_eq!(energies.sector(4), 3.0 + 12.0 * 2.0);
        assert_eq!(energies.sector(5), 28.0);
        assert_eq!(energies.front_sectors()[4], 3.0 + 3.0 * 2.0);
        assert_eq!(energies.masked(&bad)[Channel::new(4, 6).unwrap()], 0.0);
    }

    #[test]
    fn test_incomplete_readout_rejected() {
        let mut record = record_with(|_| 0.0);
        record.hits.pop();
        assert_eq!(
            EventEnergies::from_record(&record, &CalibrationMap::unit(), &BadChannelSet::new()),
            Err(MalformedEvent::HitCount { found: 223 })
        );
    }

    #[test]
    fn test_out_of_range_and_duplicate_hits_rejected() {
        let mut record = record_with(|_| 0.0);
        record.hits[10].sector = 0;
        assert!(matches!(
            EventEnergies::from_record(&record, &CalibrationMap::unit(), &BadChannelSet::new()),
            Err(MalformedEvent::OutOfRange { sector: 0, .. })
        ));

        let mut record = record_with(|_| 0.0);
        record.hits[1] = record.hits[0];
        assert!(matches!(
            EventEnergies::from_record(&record, &CalibrationMap::unit(), &BadChannelSet::new()),
            Err(MalformedEvent::DuplicateChannel(_))
        ));
    }
}
