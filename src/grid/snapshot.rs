//! Owned, serializable copies of the grid for telemetry and the monitor.

use super::cell::CellCoord;
use serde::{Deserialize, Serialize};

/// One cell of a [`GridSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub x: usize,
    pub y: usize,
    pub m: i32,
    pub c: u32,
    pub p: f64,
    pub visited: bool,
}

/// Point-in-time copy of an occupancy grid, column-major like the grid itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<CellSnapshot>,
}

impl GridSnapshot {
    pub fn cell(&self, coord: CellCoord) -> Option<&CellSnapshot> {
        if coord.x >= self.width || coord.y >= self.height {
            return None;
        }
        self.cells.get(coord.x * self.height + coord.y)
    }

    pub fn visited_count(&self) -> usize {
        self.cells.iter().filter(|c| c.visited).count()
    }

    /// One line per column of the arena, probabilities listed bottom to top:
    /// `[0.0|0.5|1.0|...]`.
    pub fn probability_rows(&self) -> Vec<String> {
        self.rows(|c| format!("{:.1}", c.p))
    }

    /// Same layout as [`probability_rows`](Self::probability_rows) with `T`/`F` visit marks.
    pub fn visit_rows(&self) -> Vec<String> {
        self.rows(|c| if c.visited { "T" } else { "F" }.to_string())
    }

    fn rows(&self, render: impl Fn(&CellSnapshot) -> String) -> Vec<String> {
        self.cells
            .chunks(self.height.max(1))
            .map(|column| {
                let parts: Vec<String> = column.iter().map(&render).collect();
                format!("[{}]", parts.join("|"))
            })
            .collect()
    }
}
