//! Deterministic per-player shroud and fog-of-war resolution for lockstep simulations.

#![forbid(unsafe_code)]

pub mod config;
mod error;
mod geometry;
mod layer;
mod map;
mod shroud;
mod snapshot;
mod visibility;

pub use crate::config::{LobbyCheckbox, LobbyOptions, ShroudConfig, ShroudOptions};
pub use crate::error::{ConfigError, ShroudError};
pub use crate::geometry::{CPos, PPos, Rect, WDist, WPos, CELL_SIZE};
pub use crate::layer::ProjectedCellLayer;
pub use crate::map::ProjectedMap;
pub use crate::shroud::{Shroud, SourceKey, SourceKind, TickContext, TickReport, WinState};
pub use crate::snapshot::ShroudSnapshot;
pub use crate::visibility::{CellState, CellVisibility};
