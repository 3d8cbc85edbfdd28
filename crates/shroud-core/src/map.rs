use crate::geometry::{CPos, PPos, Rect, WDist, WPos, CELL_SIZE};
use crate::layer::ProjectedCellLayer;

/// The map as seen by the shroud: a projected-cell rectangle, the playable bounds inside it, and
/// terrain heights used to project world cells into the shroud plane.
///
/// A world cell `(x, y)` at height `h` projects to `PPos { u: x, v: y - h }`: raised terrain is
/// drawn further up the screen, so it covers the rows above it.
#[derive(Clone, Debug)]
pub struct ProjectedMap {
    width: u32,
    height: u32,
    bounds: Rect,
    heights: Vec<u8>,
    projected_heights: ProjectedCellLayer<u8>,
}

impl ProjectedMap {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "map must be non-empty");
        Self {
            width,
            height,
            bounds: Rect::new(0, 0, width as i32, height as i32),
            heights: vec![0; (width as usize) * (height as usize)],
            projected_heights: ProjectedCellLayer::new(width, height, 0),
        }
    }

    /// Restrict the playable area. The rectangle is clipped to the map.
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds.intersect(&self.rect());
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full projected rectangle. Every shroud layer is sized to this.
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Playable bounds.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    #[inline]
    pub fn contains(&self, p: PPos) -> bool {
        self.bounds.contains(p)
    }

    pub fn contains_cell(&self, cell: CPos) -> bool {
        self.cell_index(cell).is_some()
    }

    /// In-bounds projected positions in ascending index order.
    pub fn projected_cells(&self) -> impl Iterator<Item = PPos> {
        self.bounds.positions()
    }

    pub fn projected_cell_count(&self) -> usize {
        self.bounds.area()
    }

    pub fn terrain_height(&self, cell: CPos) -> u8 {
        self.cell_index(cell).map(|i| self.heights[i]).unwrap_or(0)
    }

    pub fn set_terrain_height(&mut self, cell: CPos, height: u8) {
        let Some(index) = self.cell_index(cell) else {
            return;
        };
        if self.heights[index] == height {
            return;
        }
        self.heights[index] = height;
        self.rebuild_projected_heights();
    }

    /// Highest terrain projecting onto `p`.
    pub fn projected_height(&self, p: PPos) -> u8 {
        self.projected_heights.get(p).unwrap_or(0)
    }

    pub fn project(&self, cell: CPos) -> PPos {
        let h = i32::from(self.terrain_height(cell));
        PPos {
            u: cell.x,
            v: cell.y - h,
        }
    }

    /// Every projected position a world cell is drawn over, top row first.
    ///
    /// A cell standing above the cell south of it also covers its cliff face: the rows from its
    /// own projection down to just above its southern neighbour's. Off-map cells cover nothing.
    pub fn projected_cells_covering(&self, cell: CPos) -> Vec<PPos> {
        if !self.contains_cell(cell) {
            return Vec::new();
        }
        let top = self.project(cell);
        let below = i32::from(self.terrain_height(cell + (0, 1)));
        let height = i32::from(self.terrain_height(cell));
        let rows = (height - below).max(0);
        (top.v..=top.v + rows).map(|v| PPos { u: top.u, v }).collect()
    }

    /// Projected cell covering a world position.
    pub fn projected_cell_covering(&self, pos: WPos) -> PPos {
        PPos {
            u: pos.x.div_euclid(CELL_SIZE),
            v: pos.y.saturating_sub(pos.z).div_euclid(CELL_SIZE),
        }
    }

    /// Centre of a projected cell, on the projection plane.
    pub fn center_of_projected_cell(&self, p: PPos) -> WPos {
        WPos {
            x: p.u * CELL_SIZE + CELL_SIZE / 2,
            y: p.v * CELL_SIZE + CELL_SIZE / 2,
            z: 0,
        }
    }

    /// World position at the centre of a world cell, on top of its terrain.
    pub fn center_of_cell(&self, cell: CPos) -> WPos {
        WPos {
            x: cell.x * CELL_SIZE + CELL_SIZE / 2,
            y: cell.y * CELL_SIZE + CELL_SIZE / 2,
            z: i32::from(self.terrain_height(cell)) * CELL_SIZE,
        }
    }

    /// Projected positions whose centres lie in the annulus `(min_range, max_range]` around `pos`.
    ///
    /// - `pos` is first projected into the shroud plane. A negative `max_range` yields nothing.
    /// - The centre cell (distance 0) is always included when in range.
    /// - With `max_height_delta`, positions whose projected terrain is not lower than
    ///   `pos` height + delta are dropped.
    /// - Output is in ascending layer index order.
    pub fn cells_in_range(
        &self,
        pos: WPos,
        min_range: WDist,
        max_range: WDist,
        max_height_delta: Option<i32>,
    ) -> Vec<PPos> {
        if max_range.length() < 0 {
            return Vec::new();
        }
        // Extra half-cell covers odd-height rounding. Widened so huge ranges cannot overflow.
        let cell = i64::from(CELL_SIZE);
        let r = (i64::from(max_range.length()) + cell - 1 + cell / 2) / cell;
        let min_limit = min_range.length_squared();
        let max_limit = max_range.length_squared();

        let projected_pos = WPos::new(pos.x, pos.y.saturating_sub(pos.z), 0);
        let center = self.projected_cell_covering(pos);
        let projected_height = pos.z / CELL_SIZE;

        // Only scan the part of the search square that overlaps the playable bounds.
        let b = self.bounds;
        let clip = |c: i32, lo: i32, hi: i32| {
            let from = (i64::from(c) - r).max(i64::from(lo));
            let to = (i64::from(c) + r).min(i64::from(hi) - 1);
            (from as i32, to as i32)
        };
        let (u_from, u_to) = clip(center.u, b.left, b.right());
        let (v_from, v_to) = clip(center.v, b.top, b.bottom());

        let mut out = Vec::new();
        if u_from > u_to || v_from > v_to {
            return out;
        }
        for v in v_from..=v_to {
            for u in u_from..=u_to {
                let p = PPos { u, v };
                let dist = self
                    .center_of_projected_cell(p)
                    .horizontal_length_squared_to(projected_pos);
                if dist > max_limit || (dist != 0 && dist <= min_limit) {
                    continue;
                }
                if let Some(delta) = max_height_delta {
                    if i32::from(self.projected_height(p)) >= projected_height.saturating_add(delta) {
                        continue;
                    }
                }
                out.push(p);
            }
        }
        out
    }

    /// Convenience for sight centred on a world cell.
    pub fn cells_in_cell_range(&self, cell: CPos, range: WDist) -> Vec<PPos> {
        self.cells_in_range(self.center_of_cell(cell), WDist::ZERO, range, None)
    }

    fn cell_index(&self, cell: CPos) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width as i32 || cell.y >= self.height as i32 {
            return None;
        }
        Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    fn rebuild_projected_heights(&mut self) {
        self.projected_heights.set_all(0);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let h = self.heights[(y as usize) * (self.width as usize) + (x as usize)];
                let p = PPos { u: x, v: y - i32::from(h) };
                if let Some(index) = self.projected_heights.index(p) {
                    let slot = &mut self.projected_heights[index];
                    *slot = (*slot).max(h);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_clipped_to_map() {
        let map = ProjectedMap::new(8, 8).with_bounds(Rect::new(-2, 1, 6, 20));
        assert_eq!(map.bounds(), Rect::new(0, 1, 4, 7));
        assert!(!map.contains(PPos::new(0, 0)));
        assert!(map.contains(PPos::new(3, 7)));
    }

    #[test]
    fn raised_terrain_projects_upward() {
        let mut map = ProjectedMap::new(4, 4);
        map.set_terrain_height(CPos::new(1, 3), 2);
        assert_eq!(map.project(CPos::new(1, 3)), PPos::new(1, 1));
        assert_eq!(map.projected_height(PPos::new(1, 1)), 2);
        assert_eq!(map.projected_height(PPos::new(1, 3)), 0);
    }

    #[test]
    fn range_zero_returns_only_centre() {
        let map = ProjectedMap::new(5, 5);
        let cells = map.cells_in_cell_range(CPos::new(2, 2), WDist::ZERO);
        assert_eq!(cells, vec![PPos::new(2, 2)]);
    }

    #[test]
    fn range_one_cell_is_a_plus_shape() {
        let map = ProjectedMap::new(5, 5);
        let cells = map.cells_in_cell_range(CPos::new(2, 2), WDist::from_cells(1));
        assert_eq!(
            cells,
            vec![
                PPos::new(2, 1),
                PPos::new(1, 2),
                PPos::new(2, 2),
                PPos::new(3, 2),
                PPos::new(2, 3),
            ]
        );
    }

    #[test]
    fn annulus_excludes_inner_ring_but_keeps_centre() {
        let map = ProjectedMap::new(7, 7);
        let cells = map.cells_in_range(
            map.center_of_cell(CPos::new(3, 3)),
            WDist::from_cells(1),
            WDist::from_cells(2),
            None,
        );
        assert!(cells.contains(&PPos::new(3, 3)));
        assert!(!cells.contains(&PPos::new(3, 2)));
        assert!(cells.contains(&PPos::new(3, 1)));
    }

    #[test]
    fn range_is_clipped_to_bounds() {
        let map = ProjectedMap::new(3, 3);
        let cells = map.cells_in_cell_range(CPos::new(0, 0), WDist::from_cells(5));
        assert_eq!(cells.len(), 9);
    }

    #[test]
    fn huge_ranges_saturate_and_stay_inside_bounds() {
        assert_eq!(WDist::from_cells(3_000_000), WDist(i32::MAX));

        let map = ProjectedMap::new(8, 8);
        let cells = map.cells_in_range(
            map.center_of_cell(CPos::new(0, 0)),
            WDist::ZERO,
            WDist(i32::MAX),
            None,
        );
        assert_eq!(cells.len(), 64);
        let cells = map.cells_in_cell_range(CPos::new(0, 0), WDist::from_cells(20_000));
        assert_eq!(cells.len(), 64);
        assert!(map.cells_in_cell_range(CPos::new(3, 3), WDist(-5_000)).is_empty());
    }

    #[test]
    fn cliff_covers_rows_down_to_lower_neighbour() {
        let mut map = ProjectedMap::new(5, 6);
        map.set_terrain_height(CPos::new(2, 3), 2);
        map.set_terrain_height(CPos::new(1, 3), 2);
        map.set_terrain_height(CPos::new(1, 4), 2);

        assert_eq!(
            map.projected_cells_covering(CPos::new(2, 3)),
            vec![PPos::new(2, 1), PPos::new(2, 2), PPos::new(2, 3)]
        );
        // Same height to the south: no exposed face.
        assert_eq!(map.projected_cells_covering(CPos::new(1, 3)), vec![PPos::new(1, 1)]);
        // Bottom row drops to the map edge.
        map.set_terrain_height(CPos::new(4, 5), 1);
        assert_eq!(
            map.projected_cells_covering(CPos::new(4, 5)),
            vec![PPos::new(4, 4), PPos::new(4, 5)]
        );
        assert_eq!(map.projected_cells_covering(CPos::new(0, 0)), vec![PPos::new(0, 0)]);
        assert!(map.projected_cells_covering(CPos::new(5, 0)).is_empty());
    }

    #[test]
    fn height_delta_rejects_high_ground() {
        let mut map = ProjectedMap::new(5, 5);
        map.set_terrain_height(CPos::new(2, 3), 1);
        let cells = map.cells_in_range(
            map.center_of_cell(CPos::new(2, 4)),
            WDist::ZERO,
            WDist::from_cells(2),
            Some(1),
        );
        assert!(!cells.contains(&PPos::new(2, 2)));
        assert!(cells.contains(&PPos::new(2, 4)));
    }
}
