use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::{PPos, Rect};
use crate::layer::ProjectedCellLayer;

/// Resolved classification of one projected cell. Ordered: `Shroud < Fog < Visible`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellState {
    /// Never explored.
    #[default]
    Shroud,
    /// Explored, currently unseen.
    Fog,
    Visible,
}

bitflags! {
    /// Combined answer of `is_explored` and `is_visible` for renderers.
    ///
    /// `VISIBLE` does not imply `EXPLORED`: with fog disabled a cell still under shroud is
    /// reported visible but not explored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellVisibility: u8 {
        const EXPLORED = 0x1;
        const VISIBLE = 0x2;
    }
}

impl CellVisibility {
    pub const HIDDEN: CellVisibility = CellVisibility::empty();
}

/// Read-only view over a resolved grid plus the mode flags that give it meaning.
///
/// Shared by the live `Shroud` and its owned snapshots so both answer queries identically.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Resolution<'a> {
    pub resolved: &'a ProjectedCellLayer<CellState>,
    pub bounds: Rect,
    pub disabled: bool,
    /// Lobby fog setting, not masked by `disabled`.
    pub fog_enabled: bool,
}

impl Resolution<'_> {
    #[inline]
    pub fn fog_active(&self) -> bool {
        !self.disabled && self.fog_enabled
    }

    pub fn is_visible(&self, p: PPos) -> bool {
        if !self.fog_active() {
            return self.bounds.contains(p);
        }
        self.resolved.get(p) == Some(CellState::Visible)
    }

    pub fn is_explored(&self, p: PPos) -> bool {
        if self.disabled {
            return self.bounds.contains(p);
        }
        self.resolved.get(p).is_some_and(|state| state > CellState::Shroud)
    }

    pub fn visibility(&self, p: PPos) -> CellVisibility {
        let resolved = self.resolved.get(p);

        if self.disabled {
            if !self.fog_enabled {
                return if self.bounds.contains(p) {
                    CellVisibility::EXPLORED | CellVisibility::VISIBLE
                } else {
                    CellVisibility::HIDDEN
                };
            }
            // Shroud disabled, fog still on.
            return match resolved {
                Some(CellState::Visible) => CellVisibility::EXPLORED | CellVisibility::VISIBLE,
                Some(_) => CellVisibility::EXPLORED,
                None => CellVisibility::HIDDEN,
            };
        }

        if self.fog_enabled {
            return match resolved {
                Some(CellState::Visible) => CellVisibility::EXPLORED | CellVisibility::VISIBLE,
                Some(CellState::Fog) => CellVisibility::EXPLORED,
                _ => CellVisibility::HIDDEN,
            };
        }

        // No fog: everything resolved is visible, explored only past shroud.
        match resolved {
            Some(state) if state > CellState::Shroud => {
                CellVisibility::EXPLORED | CellVisibility::VISIBLE
            }
            Some(_) => CellVisibility::VISIBLE,
            None => CellVisibility::HIDDEN,
        }
    }
}
