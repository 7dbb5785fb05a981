//! Ground-truth arena for the simulator: boundary walls plus square blocks.

use crate::config::{ArenaConfig, SimulationConfig};
use crate::error::{ExplorerError, Result};
use crate::grid::CellCoord;
use crate::hardware::Point2D;
use crate::utils::heading_vector;
use std::collections::BTreeSet;

/// Ray marching resolution in centimeters.
const RAY_STEP_CM: f32 = 0.1;

/// Walled arena of `width x height` cells, some of them filled by blocks.
#[derive(Clone, Debug)]
pub struct Arena {
    width: usize,
    height: usize,
    cell_size: f32,
    blocks: BTreeSet<CellCoord>,
}

impl Arena {
    /// Arena without blocks.
    pub fn open(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            blocks: BTreeSet::new(),
        }
    }

    /// Parse an arena from text rows, top row (highest y) first.
    ///
    /// `#` marks a block, `.` a free cell.
    pub fn from_layout<S: AsRef<str>>(rows: &[S], cell_size: f32) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(ExplorerError::Config("arena layout is empty".to_string()));
        }

        let mut arena = Self::open(width, height, cell_size);
        for (row_index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(ExplorerError::Config(format!(
                    "arena layout row {:?} is not {} cells wide",
                    row, width
                )));
            }
            let y = height - 1 - row_index;
            for (x, ch) in row.chars().enumerate() {
                match ch {
                    '#' => {
                        arena.blocks.insert(CellCoord::new(x, y));
                    }
                    '.' => {}
                    other => {
                        return Err(ExplorerError::Config(format!(
                            "unexpected {:?} in arena layout",
                            other
                        )));
                    }
                }
            }
        }
        Ok(arena)
    }

    /// Build from configuration, falling back to an open arena for an empty layout.
    pub fn from_config(arena: &ArenaConfig, simulation: &SimulationConfig) -> Result<Self> {
        if simulation.layout.is_empty() {
            Ok(Self::open(arena.width, arena.height, arena.cell_size_cm))
        } else {
            Self::from_layout(simulation.layout.as_slice(), arena.cell_size_cm)
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn is_block(&self, coord: CellCoord) -> bool {
        self.blocks.contains(&coord)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &CellCoord> {
        self.blocks.iter()
    }

    /// Centre of a cell in centimeters.
    pub fn cell_center(&self, coord: CellCoord) -> Point2D {
        Point2D::new(
            (coord.x as f32 + 0.5) * self.cell_size,
            (coord.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Cell containing a point, None outside the arena.
    pub fn cell_at(&self, point: Point2D) -> Option<CellCoord> {
        if point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let x = (point.x / self.cell_size) as usize;
        let y = (point.y / self.cell_size) as usize;
        (x < self.width && y < self.height).then_some(CellCoord::new(x, y))
    }

    /// Whether a point lies in a wall or block.
    pub fn is_obstacle(&self, point: Point2D) -> bool {
        match self.cell_at(point) {
            Some(cell) => self.is_block(cell),
            None => true,
        }
    }

    /// Free distance along a heading before hitting an obstacle, capped at `max_cm`.
    pub fn ray_distance(&self, origin: Point2D, heading_deg: f32, max_cm: f32) -> f32 {
        if self.is_obstacle(origin) {
            return 0.0;
        }
        let (dx, dy) = heading_vector(heading_deg);
        let mut travelled = 0.0;
        while travelled < max_cm {
            let next = travelled + RAY_STEP_CM;
            let probe = Point2D::new(origin.x + dx * next, origin.y + dy * next);
            if self.is_obstacle(probe) {
                return travelled;
            }
            travelled = next;
        }
        max_cm
    }
}
