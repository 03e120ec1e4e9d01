// Per-event detector record as delivered by the event source
//
// Hits carry 1-based sector/module numbering, exactly as the detector reader
// writes them. Conversion to 0-based channels happens in `energy`.

use serde::{Deserialize, Serialize};

/// Technical trigger bit for beam pickup, plus side
pub const TECH_BPTX_PLUS: usize = 1;

/// Technical trigger bit for beam pickup, minus side
pub const TECH_BPTX_MINUS: usize = 2;

/// Level-1 algorithm bit that fires on halo muons
pub const L1_HALO_MUON_ALGO: usize = 102;

/// Run / luminosity block / event identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub run: u32,
    #[serde(default)]
    pub lumi: u32,
    pub event: u64,
}

/// One channel reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// 1-based sector
    pub sector: u32,
    /// 1-based module
    pub module: u32,
    /// Raw (uncalibrated) energy
    pub energy: f64,
}

/// Trigger decision bits of one event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerFlags {
    /// Random (zero-bias) trigger fired
    #[serde(default)]
    pub random: bool,
    /// Technical trigger bits, indexed by bit number
    #[serde(default)]
    pub technical: Vec<bool>,
    /// Dedicated halo-muon hardware trigger
    #[serde(default)]
    pub halo_muon: bool,
    /// Level-1 algorithm bits, indexed by bit number
    #[serde(default)]
    pub l1_algo: Vec<bool>,
}

impl TriggerFlags {
    /// Technical bit `bit`; missing bits read as unset
    pub fn technical_bit(&self, bit: usize) -> bool {
        self.technical.get(bit).copied().unwrap_or(false)
    }

    /// Level-1 algorithm bit `bit`; missing bits read as unset
    pub fn l1_algo_bit(&self, bit: usize) -> bool {
        self.l1_algo.get(bit).copied().unwrap_or(false)
    }

    /// Random trigger without beam in either direction
    pub fn is_random_trigger(&self) -> bool {
        self.random
            && !(self.technical_bit(TECH_BPTX_PLUS) || self.technical_bit(TECH_BPTX_MINUS))
    }

    /// Halo-muon hardware trigger or the level-1 halo algorithm
    pub fn has_muon_trigger(&self) -> bool {
        self.halo_muon || self.l1_algo_bit(L1_HALO_MUON_ALGO)
    }
}

/// Complete input record for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    #[serde(default)]
    pub hits: Vec<Hit>,
    #[serde(default)]
    pub triggers: TriggerFlags,
}
