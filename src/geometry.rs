//! Calorimeter grid geometry
//!
//! The detector is read out as 16 azimuthal sectors, each split into 14
//! longitudinal modules. A channel is one (sector, module) cell. Everything in
//! the crate uses 0-based indices; detector records carry 1-based numbering
//! and are converted with [`Channel::from_detector`].

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Number of azimuthal sectors
pub const SECTORS: usize = 16;

/// Number of longitudinal modules per sector
pub const MODULES: usize = 14;

/// Total readout channels per event
pub const CHANNELS: usize = SECTORS * MODULES;

/// Per-sector dense table
pub type SectorGrid<T> = [T; SECTORS];

/// One readout cell, identified by 0-based sector and module
///
/// Deserialization rejects coordinates outside the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "ChannelCoordinates")]
pub struct Channel {
    pub sector: usize,
    pub module: usize,
}

/// Unchecked wire form of a [`Channel`]
#[derive(Deserialize)]
struct ChannelCoordinates {
    sector: usize,
    module: usize,
}

impl TryFrom<ChannelCoordinates> for Channel {
    type Error = String;

    fn try_from(raw: ChannelCoordinates) -> Result<Self, Self::Error> {
        Channel::new(raw.sector, raw.module).ok_or_else(|| {
            format!(
                "channel (sector {}, module {}) outside the {} x {} grid",
                raw.sector, raw.module, SECTORS, MODULES
            )
        })
    }
}

impl Channel {
    /// Create a channel, rejecting out-of-range coordinates
    pub fn new(sector: usize, module: usize) -> Option<Self> {
        (sector < SECTORS && module < MODULES).then_some(Self { sector, module })
    }

    /// Convert 1-based detector numbering into a channel
    pub fn from_detector(sector: u32, module: u32) -> Option<Self> {
        let sector = (sector as usize).checked_sub(1)?;
        let module = (module as usize).checked_sub(1)?;
        Self::new(sector, module)
    }

    /// Inverse of [`Channel::linear_index`]
    pub fn from_linear(index: usize) -> Option<Self> {
        (index < CHANNELS).then_some(Self {
            sector: index / MODULES,
            module: index % MODULES,
        })
    }

    /// Sector-major linear index (`sector * 14 + module`)
    pub fn linear_index(&self) -> usize {
        self.sector * MODULES + self.module
    }

    /// Longitudinal band this channel belongs to
    pub fn band(&self) -> ModuleBand {
        ModuleBand::of_module(self.module)
    }

    /// All channels in sector-major order
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNELS).map(|i| Channel {
            sector: i / MODULES,
            module: i % MODULES,
        })
    }

    /// All channels of one sector, front to rear
    pub fn in_sector(sector: usize) -> impl Iterator<Item = Channel> {
        (0..MODULES).map(move |module| Channel { sector, module })
    }
}

/// Contiguous longitudinal module bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleBand {
    /// Modules 0-3
    Front,
    /// Modules 4-8
    Mid,
    /// Modules 9-13
    Rear,
}

impl ModuleBand {
    pub const ALL: [ModuleBand; 3] = [ModuleBand::Front, ModuleBand::Mid, ModuleBand::Rear];

    pub fn of_module(module: usize) -> Self {
        match module {
            0..=3 => ModuleBand::Front,
            4..=8 => ModuleBand::Mid,
            _ => ModuleBand::Rear,
        }
    }

    pub fn contains(&self, module: usize) -> bool {
        Self::of_module(module) == *self
    }
}

/// Sector shifted by `delta` positions around the ring
pub fn sector_offset(sector: usize, delta: isize) -> usize {
    (sector as isize + delta).rem_euclid(SECTORS as isize) as usize
}

/// Sector diametrically opposite `sector`
pub fn mirror_sector(sector: usize) -> usize {
    sector_offset(sector, (SECTORS / 2) as isize)
}

/// Sectors excluded from the neighbour-noise estimate for a muon in `sector`:
/// the sector itself, its two neighbours, its mirror and the mirror's
/// neighbours.
pub fn muon_exclusion_zone(sector: usize) -> [usize; 6] {
    let mirror = mirror_sector(sector);
    [
        sector,
        sector_offset(sector, 1),
        sector_offset(sector, -1),
        mirror,
        sector_offset(mirror, 1),
        sector_offset(mirror, -1),
    ]
}

/// Dense table with one cell per channel, stored sector-major
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGrid<T> {
    cells: Vec<T>,
}

impl<T> ChannelGrid<T> {
    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self {
            cells: Channel::all().map(&mut f).collect(),
        }
    }

    /// Build from a sector-major vector; `None` unless it has 224 entries
    pub fn from_linear(cells: Vec<T>) -> Option<Self> {
        (cells.len() == CHANNELS).then_some(Self { cells })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::all().zip(self.cells.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Channel, &mut T)> {
        Channel::all().zip(self.cells.iter_mut())
    }

    /// Cells of one sector, module order
    pub fn sector(&self, sector: usize) -> &[T] {
        &self.cells[sector * MODULES..(sector + 1) * MODULES]
    }

    /// Sector-major view
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// Combine cell-by-cell with another grid
    pub fn zip_apply<U>(&mut self, other: &ChannelGrid<U>, mut f: impl FnMut(&mut T, &U)) {
        for (cell, value) in self.cells.iter_mut().zip(other.cells.iter()) {
            f(cell, value);
        }
    }
}

impl<T: Clone> ChannelGrid<T> {
    pub fn filled(value: T) -> Self {
        Self {
            cells: vec![value; CHANNELS],
        }
    }
}

impl<T: Default> Default for ChannelGrid<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Channel> for ChannelGrid<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        &self.cells[channel.linear_index()]
    }
}

impl<T> IndexMut<Channel> for ChannelGrid<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        &mut self.cells[channel.linear_index()]
    }
}
