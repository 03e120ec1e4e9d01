// AcceptedEvent - read-only record of an accepted muon candidate
//
// Carries what an event display needs: calibrated channel energies with bad
// channels zeroed (sector-major, 224 values), the muon sector with its
// significance, the trigger flag and the band flags.

use serde::{Deserialize, Serialize};

use crate::analysis::cascade::BandCoverage;
use crate::analysis::event::EventId;
use crate::geometry::{Channel, ChannelGrid, MODULES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedEvent {
    pub id: EventId,
    pub muon_sector: usize,
    pub muon_sector_sigma: f64,
    pub has_trigger: bool,
    pub bands: BandCoverage,
    /// Sector-major channel energies (`sector * 14 + module`)
    pub channel_energies: Vec<f64>,
}

impl AcceptedEvent {
    pub fn new(
        id: EventId,
        muon_sector: usize,
        muon_sector_sigma: f64,
        has_trigger: bool,
        bands: BandCoverage,
        masked_energies: &ChannelGrid<f64>,
    ) -> Self {
        Self {
            id,
            muon_sector,
            muon_sector_sigma,
            has_trigger,
            bands,
            channel_energies: masked_energies.as_slice().to_vec(),
        }
    }

    pub fn energy(&self, channel: Channel) -> f64 {
        self.channel_energies[channel.linear_index()]
    }

    /// Energies of one sector, front to rear
    pub fn sector_profile(&self, sector: usize) -> &[f64] {
        &self.channel_energies[sector * MODULES..(sector + 1) * MODULES]
    }
}
