//! Per-player shroud and fog-of-war resolution.
//!
//! Sources add to per-cell counters; `tick` turns dirty counters into a cached `CellState` per
//! projected cell. Queries always read that cache, so they reflect the last completed tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::ShroudOptions;
use crate::error::ShroudError;
use crate::geometry::{CPos, PPos, Rect, WPos};
use crate::layer::ProjectedCellLayer;
use crate::map::ProjectedMap;
use crate::snapshot::ShroudSnapshot;
use crate::visibility::{CellState, CellVisibility, Resolution};

/// What a registered source contributes to each of its cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Counts as sight but also reveals through generated shroud.
    PassiveVisibility,
    /// Generated shroud: hides explored, unseen cells again.
    Shroud,
    /// Ordinary sight.
    Visibility,
}

/// Caller-retained handle identifying one source registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(pub u64);

/// Outcome of the owning player, as far as the shroud cares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinState {
    #[default]
    Undefined,
    Won,
    Lost,
}

/// Inputs `tick` needs from the surrounding world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickContext {
    /// Simulation tick counter.
    pub world_tick: i32,
    /// Deterministic identity hash of the owning player.
    pub player_hash: i32,
    pub win_state: WinState,
}

/// What a `tick` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Nothing was dirty and the mode did not change.
    pub skipped: bool,
    /// Every cell was recomputed because `disabled` changed.
    pub full_pass: bool,
    pub cells_resolved: usize,
    pub cells_changed: usize,
}

#[derive(Clone, Debug)]
struct ShroudSource {
    kind: SourceKind,
    /// Raw layer indices of the in-bounds cells, duplicates kept.
    indices: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct Shroud {
    bounds: Rect,
    sources: BTreeMap<SourceKey, ShroudSource>,
    next_key: u64,

    passive_visible_count: ProjectedCellLayer<i16>,
    visible_count: ProjectedCellLayer<i16>,
    generated_shroud_count: ProjectedCellLayer<i16>,
    explored: ProjectedCellLayer<bool>,
    touched: ProjectedCellLayer<bool>,
    any_cell_touched: bool,

    resolved: ProjectedCellLayer<CellState>,
    changed: Vec<PPos>,

    disabled: bool,
    disabled_changed: bool,
    fog_enabled: bool,
    explore_map_enabled: bool,

    revealed_cells: i32,
    hash: i32,

    // Latched on first use so resolution can skip the unused branches.
    shroud_generation_enabled: bool,
    passive_visibility_enabled: bool,
}

impl Shroud {
    /// Create the shroud for one player. Lobby options are read here and never again.
    pub fn new(map: &ProjectedMap, options: ShroudOptions) -> Self {
        let (width, height) = (map.width(), map.height());
        let mut shroud = Self {
            bounds: map.bounds(),
            sources: BTreeMap::new(),
            next_key: 0,
            passive_visible_count: ProjectedCellLayer::new(width, height, 0),
            visible_count: ProjectedCellLayer::new(width, height, 0),
            generated_shroud_count: ProjectedCellLayer::new(width, height, 0),
            explored: ProjectedCellLayer::new(width, height, false),
            touched: ProjectedCellLayer::new(width, height, false),
            any_cell_touched: true,
            resolved: ProjectedCellLayer::new(width, height, CellState::Shroud),
            changed: Vec::new(),
            disabled: false,
            disabled_changed: false,
            fog_enabled: options.fog_enabled,
            explore_map_enabled: options.explore_map_enabled,
            revealed_cells: 0,
            hash: 0,
            shroud_generation_enabled: false,
            passive_visibility_enabled: false,
        };

        if shroud.explore_map_enabled {
            shroud.explore_all();
        }
        if !shroud.fog_enabled && shroud.explore_map_enabled {
            shroud.revealed_cells = map.projected_cell_count() as i32;
        }
        shroud
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn contains(&self, p: PPos) -> bool {
        self.explored.contains(p)
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Turn the shroud off (or back on). Takes effect for every cell on the next `tick`.
    pub fn set_disabled(&mut self, disabled: bool) {
        if self.disabled == disabled {
            return;
        }
        debug!(disabled, "shroud mode changed");
        self.disabled = disabled;
        self.disabled_changed = true;
    }

    /// Fog is in effect: enabled in the lobby and the shroud is not disabled.
    pub fn fog_enabled(&self) -> bool {
        !self.disabled && self.fog_enabled
    }

    pub fn explore_map_enabled(&self) -> bool {
        self.explore_map_enabled
    }

    pub fn revealed_cells(&self) -> i32 {
        self.revealed_cells
    }

    /// Sync value for desync detection, refreshed by every non-skipped `tick`.
    pub fn hash(&self) -> i32 {
        self.hash
    }

    /// Positions whose resolved state was rewritten by the most recent `tick`, in index order.
    pub fn changed_cells(&self) -> &[PPos] {
        &self.changed
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn has_source(&self, key: SourceKey) -> bool {
        self.sources.contains_key(&key)
    }

    /// Issue a key not currently registered.
    pub fn next_source_key(&mut self) -> SourceKey {
        loop {
            let key = SourceKey(self.next_key);
            self.next_key = self.next_key.wrapping_add(1);
            if !self.sources.contains_key(&key) {
                return key;
            }
        }
    }

    /// Register a source under a freshly issued key.
    pub fn insert_source<I>(&mut self, kind: SourceKind, cells: I) -> SourceKey
    where
        I: IntoIterator<Item = PPos>,
    {
        let key = self.next_source_key();
        self.register(key, kind, cells);
        key
    }

    /// Register a source. Cells outside the map bounds are ignored.
    pub fn add_source<I>(&mut self, key: SourceKey, kind: SourceKind, cells: I) -> Result<(), ShroudError>
    where
        I: IntoIterator<Item = PPos>,
    {
        if self.sources.contains_key(&key) {
            debug!(?key, ?kind, "rejected duplicate shroud source");
            return Err(ShroudError::DuplicateSource { key });
        }
        self.register(key, kind, cells);
        Ok(())
    }

    fn register<I>(&mut self, key: SourceKey, kind: SourceKind, cells: I)
    where
        I: IntoIterator<Item = PPos>,
    {
        let mut indices = Vec::new();
        for p in cells {
            // Cells outside the playable bounds are forced invisible.
            if !self.bounds.contains(p) {
                continue;
            }
            let Some(index) = self.touched.index(p) else {
                continue;
            };
            indices.push(index);
        }

        if !indices.is_empty() {
            match kind {
                SourceKind::PassiveVisibility => self.passive_visibility_enabled = true,
                SourceKind::Shroud => self.shroud_generation_enabled = true,
                SourceKind::Visibility => {}
            }
        }

        for &index in &indices {
            self.touched[index] = true;
            self.any_cell_touched = true;
            match kind {
                SourceKind::PassiveVisibility => {
                    self.passive_visible_count[index] = self.passive_visible_count[index].wrapping_add(1);
                    self.explored[index] = true;
                }
                SourceKind::Visibility => {
                    self.visible_count[index] = self.visible_count[index].wrapping_add(1);
                    self.explored[index] = true;
                }
                SourceKind::Shroud => {
                    self.generated_shroud_count[index] = self.generated_shroud_count[index].wrapping_add(1);
                }
            }
        }

        self.sources.insert(key, ShroudSource { kind, indices });
    }

    /// Unregister a source. Unknown keys are ignored; exploration is never undone.
    pub fn remove_source(&mut self, key: SourceKey) -> bool {
        let Some(source) = self.sources.remove(&key) else {
            return false;
        };

        let counts = match source.kind {
            SourceKind::PassiveVisibility => &mut self.passive_visible_count,
            SourceKind::Visibility => &mut self.visible_count,
            SourceKind::Shroud => &mut self.generated_shroud_count,
        };
        for &index in &source.indices {
            self.touched[index] = true;
            self.any_cell_touched = true;
            counts[index] = counts[index].wrapping_sub(1);
            debug_assert!(
                counts[index] >= 0,
                "{:?} count underflow at index {index}",
                source.kind
            );
        }
        true
    }

    pub fn explore_projected_cells<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = PPos>,
    {
        for p in cells {
            if !self.bounds.contains(p) {
                continue;
            }
            if let Some(index) = self.explored.index(p) {
                self.mark_explored(index);
            }
        }
    }

    /// Union another player's exploration into this one.
    pub fn explore(&mut self, other: &Shroud) -> Result<(), ShroudError> {
        if self.bounds != other.bounds || !self.explored.same_shape(&other.explored) {
            return Err(ShroudError::BoundsMismatch {
                ours: self.bounds,
                theirs: other.bounds,
            });
        }

        for p in self.bounds.positions() {
            let Some(index) = self.explored.index(p) else {
                continue;
            };
            if other.explored[index] {
                self.mark_explored(index);
            }
        }
        Ok(())
    }

    pub fn explore_all(&mut self) {
        for p in self.bounds.positions() {
            if let Some(index) = self.explored.index(p) {
                self.mark_explored(index);
            }
        }
    }

    /// Forget everything not currently in sight.
    ///
    /// Only live sight counts; generated shroud and exploration-only reveals are dropped.
    pub fn reset_exploration(&mut self) {
        for p in self.bounds.positions() {
            let Some(index) = self.explored.index(p) else {
                continue;
            };
            self.touched[index] = true;
            let sight = i32::from(self.visible_count[index]) + i32::from(self.passive_visible_count[index]);
            self.explored[index] = sight > 0;
        }
        self.any_cell_touched = true;
    }

    #[inline]
    fn mark_explored(&mut self, index: usize) {
        if !self.explored[index] {
            self.touched[index] = true;
            self.any_cell_touched = true;
            self.explored[index] = true;
        }
    }

    /// Resolve every dirty cell. Call once per simulation step, before any reads for that step.
    pub fn tick(&mut self, ctx: &TickContext) -> TickReport {
        self.changed.clear();

        if !self.any_cell_touched && !self.disabled_changed {
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        }
        self.any_cell_touched = false;

        let lost = ctx.win_state == WinState::Lost;
        let mut report = TickReport {
            full_pass: self.disabled_changed,
            ..TickReport::default()
        };

        if self.disabled_changed {
            self.touched.set_all(false);
            for index in 0..self.touched.max_index() {
                report.cells_changed += usize::from(self.update_cell(index, lost));
            }
            report.cells_resolved = self.touched.max_index();
        } else {
            // Most cells are untouched; scan for the dirty ones.
            let mut next = self.touched.index_of(true, 0);
            while let Some(index) = next {
                self.touched[index] = false;
                report.cells_changed += usize::from(self.update_cell(index, lost));
                report.cells_resolved += 1;
                next = self.touched.index_of(true, index + 1);
            }
        }

        self.hash = ctx.player_hash.wrapping_add(ctx.world_tick);
        self.disabled_changed = false;

        trace!(
            tick = ctx.world_tick,
            full_pass = report.full_pass,
            resolved = report.cells_resolved,
            changed = report.cells_changed,
            revealed = self.revealed_cells,
            "shroud resolved"
        );
        report
    }

    /// Returns whether the cached state was rewritten.
    fn update_cell(&mut self, index: usize, lost: bool) -> bool {
        let mut state = CellState::Shroud;

        if self.explored[index] {
            let mut count = i32::from(self.visible_count[index]);
            if !self.shroud_generation_enabled || count > 0 || self.generated_shroud_count[index] == 0 {
                if self.passive_visibility_enabled {
                    count += i32::from(self.passive_visible_count[index]);
                }
                state = if count > 0 {
                    CellState::Visible
                } else {
                    CellState::Fog
                };
            }
        }

        let old = self.resolved[index];
        if state == old && !self.disabled_changed {
            return false;
        }

        self.resolved[index] = state;
        let p = self.resolved.ppos_from_index(index);
        if self.bounds.contains(p) {
            self.changed.push(p);
        }

        if !self.disabled_changed && (self.fog_enabled || !self.explore_map_enabled) {
            if state == CellState::Visible {
                self.revealed_cells += 1;
            } else if self.fog_enabled && old == CellState::Visible {
                self.revealed_cells -= 1;
            }
        }

        if lost {
            self.revealed_cells = 0;
        }
        true
    }

    fn resolution(&self) -> Resolution<'_> {
        Resolution {
            resolved: &self.resolved,
            bounds: self.bounds,
            disabled: self.disabled,
            fog_enabled: self.fog_enabled,
        }
    }

    /// Resolved state as of the last tick, `None` outside the layer.
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

    /// World cell variant: explored if any projected cell it is drawn over is. Cells off the map
    /// are never explored.
    pub fn is_explored_cell(&self, map: &ProjectedMap, cell: CPos) -> bool {
        map.contains_cell(cell)
            && map
                .projected_cells_covering(cell)
                .into_iter()
                .any(|p| self.is_explored(p))
    }

    pub fn is_visible_cell(&self, map: &ProjectedMap, cell: CPos) -> bool {
        map.projected_cells_covering(cell)
            .into_iter()
            .any(|p| self.is_visible(p))
    }

    pub fn is_explored_at(&self, map: &ProjectedMap, pos: WPos) -> bool {
        self.is_explored(map.projected_cell_covering(pos))
    }

    pub fn is_visible_at(&self, map: &ProjectedMap, pos: WPos) -> bool {
        self.is_visible(map.projected_cell_covering(pos))
    }

    pub fn visibility_at(&self, map: &ProjectedMap, pos: WPos) -> CellVisibility {
        self.visibility(map.projected_cell_covering(pos))
    }

    /// Owned copy of the committed state for readers outside the simulation step.
    pub fn snapshot(&self) -> ShroudSnapshot {
        ShroudSnapshot::new(
            self.resolved.clone(),
            self.bounds,
            self.disabled,
            self.fog_enabled,
            self.explore_map_enabled,
            self.revealed_cells,
            self.hash,
        )
    }

    #[cfg(test)]
    pub(crate) fn counts_at(&self, p: PPos) -> (i16, i16, i16, bool) {
        let index = self.explored.index(p).expect("position inside layer");
        (
            self.visible_count[index],
            self.passive_visible_count[index],
            self.generated_shroud_count[index],
            self.explored[index],
        )
    }
}
