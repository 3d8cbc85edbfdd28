use serde::{Deserialize, Serialize};

use crate::error::ShroudError;
use crate::geometry::{PPos, Rect};
use crate::layer::ProjectedCellLayer;
use crate::visibility::{CellState, CellVisibility, Resolution};

/// Immutable copy of a shroud's committed state.
///
/// Taken after `tick`, it answers the same queries as the live shroud and can be handed to a
/// render thread while the simulation moves on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShroudSnapshot {
    resolved: ProjectedCellLayer<CellState>,
    bounds: Rect,
    disabled: bool,
    fog_enabled: bool,
    explore_map_enabled: bool,
    revealed_cells: i32,
    hash: i32,
}

impl ShroudSnapshot {
    pub(crate) fn new(
        resolved: ProjectedCellLayer<CellState>,
        bounds: Rect,
        disabled: bool,
        fog_enabled: bool,
        explore_map_enabled: bool,
        revealed_cells: i32,
        hash: i32,
    ) -> Self {
        Self {
            resolved,
            bounds,
            disabled,
            fog_enabled,
            explore_map_enabled,
            revealed_cells,
            hash,
        }
    }

    fn resolution(&self) -> Resolution<'_> {
        Resolution {
            resolved: &self.resolved,
            bounds: self.bounds,
            disabled: self.disabled,
            fog_enabled: self.fog_enabled,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn fog_enabled(&self) -> bool {
        !self.disabled && self.fog_enabled
    }

    pub fn explore_map_enabled(&self) -> bool {
        self.explore_map_enabled
    }

    pub fn revealed_cells(&self) -> i32 {
        self.revealed_cells
    }

    pub fn hash(&self) -> i32 {
        self.hash
    }

    pub fn resolved_state(&self, p: PPos) -> Option<CellState> {
        self.resolved.get(p)
    }

    pub fn is_visible(&self, p: PPos) -> bool {
        self.resolution().is_visible(p)
    }

    pub fn is_explored(&self, p: PPos) -> bool {
        self.resolution().is_explored(p)
    }

    pub fn visibility(&self, p: PPos) -> CellVisibility {
        self.resolution().visibility(p)
    }

    /// Count of in-bounds cells in each state: `[shroud, fog, visible]`.
    pub fn state_counts(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for p in self.bounds.positions() {
            if let Some(state) = self.resolved.get(p) {
                counts[state as usize] += 1;
            }
        }
        counts
    }

    /// Stable digest of the whole snapshot for bit-exact comparisons across clients.
    ///
    /// FNV-1a 64 over the MessagePack encoding.
    pub fn digest(&self) -> Result<u64, ShroudError> {
        let bytes = rmp_serde::to_vec(self)?;
        Ok(fnv1a64(&bytes))
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
