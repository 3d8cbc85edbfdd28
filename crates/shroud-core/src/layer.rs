use serde::{Deserialize, Serialize};

use crate::geometry::PPos;

/// Dense per-cell storage over the projected-cell rectangle of a map.
///
/// - Row-major raw indices: `index = v * width + u`.
/// - Every shroud counter and cache is one of these, so a raw index means the same cell in all of
///   them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedCellLayer<T> {
    width: u32,
    height: u32,
    entries: Vec<T>,
}

impl<T: Copy + PartialEq> ProjectedCellLayer<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            entries: vec![fill; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// One past the largest raw index.
    pub fn max_index(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn contains(&self, p: PPos) -> bool {
        p.u >= 0 && p.v >= 0 && p.u < self.width as i32 && p.v < self.height as i32
    }

    #[inline]
    pub fn index(&self, p: PPos) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        Some((p.v as usize) * (self.width as usize) + (p.u as usize))
    }

    #[inline]
    pub fn ppos_from_index(&self, index: usize) -> PPos {
        let width = self.width.max(1) as usize;
        PPos {
            u: (index % width) as i32,
            v: (index / width) as i32,
        }
    }

    pub fn get(&self, p: PPos) -> Option<T> {
        self.index(p).map(|i| self.entries[i])
    }

    pub fn set_all(&mut self, value: T) {
        self.entries.fill(value);
    }

    /// Next raw index at or after `from` holding `value`.
    pub fn index_of(&self, value: T, from: usize) -> Option<usize> {
        let tail = self.entries.get(from..)?;
        tail.iter().position(|e| *e == value).map(|offset| from + offset)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn same_shape<U>(&self, other: &ProjectedCellLayer<U>) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl<T> std::ops::Index<usize> for ProjectedCellLayer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.entries[index]
    }
}

impl<T> std::ops::IndexMut<usize> for ProjectedCellLayer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.entries[index]
    }
}

impl<T> std::ops::Index<PPos> for ProjectedCellLayer<T> {
    type Output = T;

    fn index(&self, p: PPos) -> &T {
        assert!(
            p.u >= 0 && p.v >= 0 && p.u < self.width as i32 && p.v < self.height as i32,
            "position {p:?} outside {}x{} layer",
            self.width,
            self.height
        );
        &self.entries[(p.v as usize) * (self.width as usize) + (p.u as usize)]
    }
}

impl<T> std::ops::IndexMut<PPos> for ProjectedCellLayer<T> {
    fn index_mut(&mut self, p: PPos) -> &mut T {
        assert!(
            p.u >= 0 && p.v >= 0 && p.u < self.width as i32 && p.v < self.height as i32,
            "position {p:?} outside {}x{} layer",
            self.width,
            self.height
        );
        &mut self.entries[(p.v as usize) * (self.width as usize) + (p.u as usize)]
    }
}
