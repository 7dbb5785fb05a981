//! Waypoint resolution over the occupancy grid.
//!
//! A [`WaypointResolver`] captures a [`NavGraph`] snapshot of the grid when
//! it is created and answers shortest-path queries with A*. Paths only pass
//! through cells that are free and have been observed at least once.

mod astar;
mod graph;

pub use astar::PlannedPath;
pub use graph::NavGraph;

use crate::grid::{CellCoord, OccupancyGrid};
use log::debug;

/// Shortest-path planner over a grid snapshot.
#[derive(Clone, Debug)]
pub struct WaypointResolver {
    graph: NavGraph,
}

impl WaypointResolver {
    /// Snapshot the grid into a navigation graph.
    pub fn new(grid: &OccupancyGrid) -> Self {
        Self {
            graph: NavGraph::from_grid(grid),
        }
    }

    pub fn graph(&self) -> &NavGraph {
        &self.graph
    }

    /// Shortest path from `start` to `goal`, excluding `start`.
    ///
    /// Returns an empty path when `start == goal` and None when the goal is
    /// unreachable or either cell lies outside the grid.
    pub fn calculate_path(&self, start: CellCoord, goal: CellCoord) -> Option<PlannedPath> {
        let (Some(start_index), Some(goal_index)) =
            (self.graph.index(start), self.graph.index(goal))
        else {
            debug!("WaypointResolver: {} -> {} outside the grid", start, goal);
            return None;
        };

        let path = astar::search(&self.graph, start_index, goal_index);
        match &path {
            Some(p) => debug!(
                "WaypointResolver: {} -> {} in {} steps ({} nodes expanded)",
                start,
                goal,
                p.waypoints.len(),
                p.nodes_expanded
            ),
            None => debug!("WaypointResolver: no path {} -> {}", start, goal),
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: usize, y: usize) -> CellCoord {
        CellCoord::new(x, y)
    }

    fn scanned_free_grid(width: usize, height: usize) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(width, height).unwrap();
        for x in 0..width {
            for y in 0..height {
                grid.cell_mut(c(x, y)).unwrap().unoccupied();
            }
        }
        grid
    }

    fn assert_adjacent_steps(start: CellCoord, path: &[CellCoord]) {
        let mut previous = start;
        for &step in path {
            assert_eq!(previous.manhattan(step), 1, "{} -> {}", previous, step);
            previous = step;
        }
    }

    #[test]
    fn test_open_grid_corner_to_corner() {
        let grid = scanned_free_grid(3, 3);
        let resolver = WaypointResolver::new(&grid);
        let path = resolver.calculate_path(c(0, 0), c(2, 2)).unwrap();

        assert_eq!(path.waypoints.len(), 4);
        assert_eq!(path.cost, 4);
        assert_eq!(path.waypoints.last(), Some(&c(2, 2)));
        assert!(!path.waypoints.contains(&c(0, 0)));
        assert_adjacent_steps(c(0, 0), &path.waypoints);
    }

    #[test]
    fn test_tie_break_prefers_first_found_direction() {
        let grid = scanned_free_grid(3, 3);
        let resolver = WaypointResolver::new(&grid);
        let path = resolver.calculate_path(c(0, 0), c(2, 2)).unwrap();
        // Up is enumerated before right and equal-cost entries keep their order
        assert_eq!(path.waypoints, vec![c(0, 1), c(0, 2), c(1, 2), c(2, 2)]);
    }

    #[test]
    fn test_path_avoids_blocks_and_unscanned_cells() {
        // Left column never observed, centre cell a block
        let mut grid = OccupancyGrid::new(3, 3).unwrap();
        for x in 1..3 {
            for y in 0..3 {
                grid.cell_mut(c(x, y)).unwrap().unoccupied();
            }
        }
        grid.cell_mut(c(1, 1)).unwrap().occupied();
        grid.cell_mut(c(1, 1)).unwrap().occupied();

        let resolver = WaypointResolver::new(&grid);
        let path = resolver.calculate_path(c(1, 0), c(1, 2)).unwrap();
        assert_eq!(path.waypoints, vec![c(2, 0), c(2, 1), c(2, 2), c(1, 2)]);
        for step in &path.waypoints {
            let cell = grid.cell(*step).unwrap();
            assert!(cell.is_free() && cell.is_scanned());
        }
    }

    #[test]
    fn test_walled_off_goal_has_no_path() {
        // Middle row: one occupied, two unobserved
        let mut walled = OccupancyGrid::new(3, 3).unwrap();
        for x in 0..3 {
            for y in [0, 2] {
                walled.cell_mut(c(x, y)).unwrap().unoccupied();
            }
        }
        walled.cell_mut(c(0, 1)).unwrap().occupied();

        let resolver = WaypointResolver::new(&walled);
        assert!(resolver.calculate_path(c(0, 0), c(2, 2)).is_none());

        // Observing the rest of the row opens a way through
        walled.cell_mut(c(2, 1)).unwrap().unoccupied();
        let resolver = WaypointResolver::new(&walled);
        assert!(resolver.calculate_path(c(0, 0), c(2, 2)).is_some());
    }

    #[test]
    fn test_unscanned_goal_unreachable() {
        let mut grid = OccupancyGrid::new(2, 1).unwrap();
        grid.cell_mut(c(0, 0)).unwrap().unoccupied();
        let resolver = WaypointResolver::new(&grid);
        assert!(resolver.calculate_path(c(0, 0), c(1, 0)).is_none());
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = scanned_free_grid(2, 2);
        let resolver = WaypointResolver::new(&grid);
        let path = resolver.calculate_path(c(1, 1), c(1, 1)).unwrap();
        assert!(path.waypoints.is_empty());
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = scanned_free_grid(2, 2);
        let resolver = WaypointResolver::new(&grid);
        assert!(resolver.calculate_path(c(0, 0), c(5, 5)).is_none());
        assert!(resolver.calculate_path(c(9, 0), c(1, 1)).is_none());
    }

    #[test]
    fn test_detour_around_block() {
        let mut grid = scanned_free_grid(4, 3);
        for y in 0..2 {
            grid.cell_mut(c(1, y)).unwrap().occupied();
            grid.cell_mut(c(1, y)).unwrap().occupied();
        }
        let resolver = WaypointResolver::new(&grid);
        let path = resolver.calculate_path(c(0, 0), c(3, 0)).unwrap();
        assert_eq!(path.cost, 7);
        assert_adjacent_steps(c(0, 0), &path.waypoints);
        assert!(path.waypoints.contains(&c(1, 2)));
    }
}
