//! Fixed-size occupancy grid with orthogonal adjacency.

use super::cell::{CellCoord, GridCell};
use super::snapshot::{CellSnapshot, GridSnapshot};
use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};

/// Heading that faces the +Y neighbour.
pub const HEADING_UP: f32 = 0.0;
/// Heading that faces the +X neighbour.
pub const HEADING_RIGHT: f32 = 90.0;
/// Heading that faces the -Y neighbour.
pub const HEADING_DOWN: f32 = 180.0;
/// Heading that faces the -X neighbour.
pub const HEADING_LEFT: f32 = 270.0;

/// Occupancy grid, stored column-major (x outer, y inner).
///
/// Every neighbour query is 4-connected, bounds-checked and returns cells in
/// up, down, left, right order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<GridCell>,
}

impl OccupancyGrid {
    /// Create an unobserved grid. Dimensions must be non-zero.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ExplorerError::Config(format!(
                "grid dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let cells = (0..width)
            .flat_map(|x| (0..height).map(move |y| GridCell::new(CellCoord::new(x, y))))
            .collect();
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Linear index of a coordinate, or None when outside the grid.
    #[inline]
    pub fn index(&self, coord: CellCoord) -> Option<usize> {
        self.contains(coord).then_some(coord.x * self.height + coord.y)
    }

    /// Coordinate of a linear index.
    #[inline]
    pub fn coord_of(&self, index: usize) -> CellCoord {
        CellCoord::new(index / self.height, index % self.height)
    }

    pub fn cell(&self, coord: CellCoord) -> Option<&GridCell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, coord: CellCoord) -> Option<&mut GridCell> {
        self.index(coord).map(|i| &mut self.cells[i])
    }

    /// Like [`cell_mut`](Self::cell_mut) but reports out-of-range coordinates as an error.
    pub fn try_cell_mut(&mut self, coord: CellCoord) -> Result<&mut GridCell> {
        let (width, height) = (self.width, self.height);
        self.cell_mut(coord).ok_or(ExplorerError::OutOfBounds {
            x: coord.x,
            y: coord.y,
            width,
            height,
        })
    }

    /// All cells in grid order.
    pub fn iter(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter()
    }

    /// In-bounds orthogonal neighbours in up, down, left, right order.
    pub fn neighbours(&self, coord: CellCoord) -> Vec<CellCoord> {
        let mut out = Vec::with_capacity(4);
        if coord.y + 1 < self.height {
            out.push(CellCoord::new(coord.x, coord.y + 1));
        }
        if coord.y > 0 {
            out.push(CellCoord::new(coord.x, coord.y - 1));
        }
        if coord.x > 0 {
            out.push(CellCoord::new(coord.x - 1, coord.y));
        }
        if coord.x + 1 < self.width {
            out.push(CellCoord::new(coord.x + 1, coord.y));
        }
        out
    }

    fn neighbours_where(
        &self,
        coord: CellCoord,
        predicate: impl Fn(&GridCell) -> bool,
    ) -> Vec<CellCoord> {
        self.neighbours(coord)
            .into_iter()
            .filter(|n| self.cell(*n).is_some_and(&predicate))
            .collect()
    }

    /// Neighbours believed to contain an obstacle (P >= 0.5).
    pub fn block_neighbours(&self, coord: CellCoord) -> Vec<CellCoord> {
        self.neighbours_where(coord, GridCell::is_block)
    }

    /// Neighbours that still need scanning (not yet visited).
    pub fn scan_neighbours(&self, coord: CellCoord) -> Vec<CellCoord> {
        self.neighbours_where(coord, |c| !c.visited())
    }

    /// Neighbours that are free, unvisited and have been observed.
    pub fn free_unvisited_neighbours(&self, coord: CellCoord) -> Vec<CellCoord> {
        self.neighbours_where(coord, |c| c.is_free() && !c.visited() && c.is_scanned())
    }

    /// Every free, unvisited, observed cell in grid order.
    pub fn scanned_unvisited(&self) -> Vec<CellCoord> {
        self.cells
            .iter()
            .filter(|c| c.is_free() && !c.visited() && c.is_scanned())
            .map(GridCell::coord)
            .collect()
    }

    /// Absolute heading from one cell toward an adjacent one.
    ///
    /// A horizontal offset takes precedence over a vertical one.
    pub fn angle_to_cell(&self, from: CellCoord, to: CellCoord) -> f32 {
        let mut angle = 0.0;
        if to.y > from.y {
            angle = HEADING_UP;
        }
        if to.y < from.y {
            angle = HEADING_DOWN;
        }
        if to.x < from.x {
            angle = HEADING_LEFT;
        }
        if to.x > from.x {
            angle = HEADING_RIGHT;
        }
        angle
    }

    /// Whether the cell touches the arena boundary.
    pub fn is_next_to_wall(&self, coord: CellCoord) -> bool {
        coord.x == 0 || coord.y == 0 || coord.x + 1 == self.width || coord.y + 1 == self.height
    }

    /// Absolute headings of every boundary wall the cell touches.
    pub fn wall_headings(&self, coord: CellCoord) -> Vec<f32> {
        let mut headings = Vec::with_capacity(2);
        if coord.x == 0 {
            headings.push(HEADING_LEFT);
        }
        if coord.x + 1 == self.width {
            headings.push(HEADING_RIGHT);
        }
        if coord.y == 0 {
            headings.push(HEADING_DOWN);
        }
        if coord.y + 1 == self.height {
            headings.push(HEADING_UP);
        }
        headings
    }

    pub fn visited_count(&self) -> usize {
        self.cells.iter().filter(|c| c.visited()).count()
    }

    /// Deep copy of the grid contents with derived probabilities.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            width: self.width,
            height: self.height,
            cells: self
                .cells
                .iter()
                .map(|c| CellSnapshot {
                    x: c.coord().x,
                    y: c.coord().y,
                    m: c.m(),
                    c: c.c(),
                    p: c.probability(),
                    visited: c.visited(),
                })
                .collect(),
        }
    }
}
