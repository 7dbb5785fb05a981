//! Probabilistic occupancy map of the arena.
//!
//! Each cell keeps two counters: the number of observations `C` and the net
//! occupied score `M`. The occupancy probability `P` is derived from them on
//! every read; a cell with `P < 0.5` is free.

mod cell;
mod occupancy;
mod snapshot;

pub use cell::{CellCoord, FREE_CELL_DETERMINANT, GridCell};
pub use occupancy::{HEADING_DOWN, HEADING_LEFT, HEADING_RIGHT, HEADING_UP, OccupancyGrid};
pub use snapshot::{CellSnapshot, GridSnapshot};
