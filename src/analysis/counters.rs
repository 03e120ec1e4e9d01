// EventCounters - 8-slot ordered tally of cascade stages
//
// Slot numbering follows the stored `EventCount` table:
//   1 read, 2 complete readout, 3 random trigger, 4 muon trigger present,
//   5 single hot sector (both gates), 6 channel multiplicity,
//   7 accepted with trigger, 8 accepted without trigger requirement

use serde::{Deserialize, Serialize};

use crate::analysis::cascade::{CascadeDecision, Classification};

/// Named counter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Read,
    CompleteReadout,
    RandomTrigger,
    MuonTrigger,
    SingleHotSector,
    ChannelMultiplicity,
    AcceptedWithTrigger,
    Accepted,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Read,
        Stage::CompleteReadout,
        Stage::RandomTrigger,
        Stage::MuonTrigger,
        Stage::SingleHotSector,
        Stage::ChannelMultiplicity,
        Stage::AcceptedWithTrigger,
        Stage::Accepted,
    ];

    /// 1-based slot number
    pub fn slot(&self) -> usize {
        *self as usize + 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::CompleteReadout => "complete_readout",
            Stage::RandomTrigger => "random_trigger",
            Stage::MuonTrigger => "muon_trigger",
            Stage::SingleHotSector => "single_hot_sector",
            Stage::ChannelMultiplicity => "channel_multiplicity",
            Stage::AcceptedWithTrigger => "accepted_with_trigger",
            Stage::Accepted => "accepted",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    counts: [u64; 8],
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a stored table; `None` unless it has 8 slots
    pub fn from_slots(slots: &[u64]) -> Option<Self> {
        let counts: [u64; 8] = slots.try_into().ok()?;
        Some(Self { counts })
    }

    pub fn increment(&mut self, stage: Stage) {
        self.counts[stage as usize] += 1;
    }

    pub fn get(&self, stage: Stage) -> u64 {
        self.counts[stage as usize]
    }

    /// Counts in slot order
    pub fn slots(&self) -> &[u64; 8] {
        &self.counts
    }

    /// Advance every slot the cascade decision reached
    ///
    /// Read and complete-readout slots are advanced by the caller before the
    /// cascade runs.
    pub fn record_decision(&mut self, decision: &CascadeDecision) {
        if decision.is_random {
            self.increment(Stage::RandomTrigger);
        }
        if decision.has_trigger {
            self.increment(Stage::MuonTrigger);
        }
        if decision.passed_hot_sector_gates() {
            self.increment(Stage::SingleHotSector);
        }
        if decision.passed_channel_multiplicity() {
            self.increment(Stage::ChannelMultiplicity);
        }
        match decision.classification {
            Classification::AcceptedWithTrigger => {
                self.increment(Stage::AcceptedWithTrigger);
                self.increment(Stage::Accepted);
            }
            Classification::AcceptedNoTrigger => self.increment(Stage::Accepted),
            Classification::Rejected(_) => {}
        }
    }

    pub fn merge(&mut self, other: &EventCounters) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
    }
}
