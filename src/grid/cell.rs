//! Grid coordinates and the counter-based occupancy cell.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cells with a probability below this are considered free.
pub const FREE_CELL_DETERMINANT: f64 = 0.5;

/// Integer cell coordinate, `x` across and `y` up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: usize,
    pub y: usize,
}

impl CellCoord {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell.
    #[inline]
    pub fn manhattan(&self, other: CellCoord) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One arena cell.
///
/// `m` is the net occupied score (+1 per occupied observation, -1 per free
/// observation) and `c` the observation count. The occupancy probability is
/// derived on every read and never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    coord: CellCoord,
    visited: bool,
    m: i32,
    c: u32,
}

impl GridCell {
    pub fn new(coord: CellCoord) -> Self {
        Self {
            coord,
            visited: false,
            m: 0,
            c: 0,
        }
    }

    #[inline]
    pub fn coord(&self) -> CellCoord {
        self.coord
    }

    #[inline]
    pub fn visited(&self) -> bool {
        self.visited
    }

    pub fn set_visited(&mut self, visited: bool) {
        self.visited = visited;
    }

    /// Net occupied score
    #[inline]
    pub fn m(&self) -> i32 {
        self.m
    }

    /// Observation count
    #[inline]
    pub fn c(&self) -> u32 {
        self.c
    }

    /// Record an observation of an obstacle in this cell.
    pub fn occupied(&mut self) {
        self.c += 1;
        self.m += 1;
    }

    /// Record an observation of free space in this cell.
    pub fn unoccupied(&mut self) {
        self.c += 1;
        self.m -= 1;
    }

    /// Occupancy probability: 0 when never observed, else (M + C) / 2C clamped to [0, 1].
    pub fn probability(&self) -> f64 {
        if self.c == 0 {
            return 0.0;
        }
        let c = f64::from(self.c);
        ((f64::from(self.m) + c) / (2.0 * c)).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.probability() < FREE_CELL_DETERMINANT
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        !self.is_free()
    }

    #[inline]
    pub fn is_scanned(&self) -> bool {
        self.c > 0
    }
}
