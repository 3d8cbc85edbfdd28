use serde::{Deserialize, Serialize};

/// World units per cell edge.
pub const CELL_SIZE: i32 = 1024;

/// Position in the shroud's projection plane (`u` = column, `v` = row).
///
/// Several world cells at different terrain heights may project onto the same `PPos`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PPos {
    pub u: i32,
    pub v: i32,
}

impl PPos {
    #[inline]
    pub const fn new(u: i32, v: i32) -> Self {
        Self { u, v }
    }
}

/// World cell coordinate, before terrain height is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CPos {
    pub x: i32,
    pub y: i32,
}

impl CPos {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add<(i32, i32)> for CPos {
    type Output = CPos;

    fn add(self, (dx, dy): (i32, i32)) -> CPos {
        CPos {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Fixed-point world position. `z` is height above the ground plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance in the ground plane, ignoring `z`.
    pub fn horizontal_length_squared_to(self, other: WPos) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// World distance in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WDist(pub i32);

impl WDist {
    pub const ZERO: WDist = WDist(0);

    /// Saturates at the `i32` limits.
    #[inline]
    pub const fn from_cells(cells: i32) -> Self {
        Self(cells.saturating_mul(CELL_SIZE))
    }

    #[inline]
    pub const fn length(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn length_squared(self) -> i64 {
        i64::from(self.0) * i64::from(self.0)
    }
}

/// Axis-aligned rectangle of projected cells, `left..left + width` by `top..top + height`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    #[inline]
    pub const fn right(&self) -> i32 {
        self.left + self.width
    }

    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.top + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn contains(&self, p: PPos) -> bool {
        p.u >= self.left && p.u < self.right() && p.v >= self.top && p.v < self.bottom()
    }

    /// Overlap of two rectangles; empty rectangles collapse to zero size.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::new(left, top, 0, 0);
        }
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Every position in the rectangle, row by row.
    pub fn positions(self) -> impl Iterator<Item = PPos> {
        let (left, right) = (self.left, self.right());
        (self.top..self.bottom()).flat_map(move |v| (left..right).map(move |u| PPos { u, v }))
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.width as usize) * (self.height as usize)
        }
    }
}
