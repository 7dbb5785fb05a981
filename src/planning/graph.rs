//! Navigation graph snapshot built from an occupancy grid.

use crate::grid::{CellCoord, OccupancyGrid};

/// Orthogonal offsets of the 3x3 window, in up, down, left, right order.
/// Diagonals are never edges.
const ORTHOGONAL: [(isize, isize); 4] = [(0, 1), (0, -1), (-1, 0), (1, 0)];

/// Adjacency lists over grid indices.
///
/// An edge `a -> b` exists when `b` is an orthogonal neighbour of `a` that is
/// both free and observed. The graph is a copy: later grid updates do not
/// affect it.
#[derive(Clone, Debug)]
pub struct NavGraph {
    width: usize,
    height: usize,
    adjacency: Vec<Vec<usize>>,
}

impl NavGraph {
    pub fn from_grid(grid: &OccupancyGrid) -> Self {
        let (width, height) = (grid.width(), grid.height());
        let mut adjacency = vec![Vec::new(); grid.len()];

        for cell in grid.iter() {
            let coord = cell.coord();
            let Some(index) = grid.index(coord) else {
                continue;
            };
            for (dx, dy) in ORTHOGONAL {
                let (Some(nx), Some(ny)) = (
                    coord.x.checked_add_signed(dx),
                    coord.y.checked_add_signed(dy),
                ) else {
                    continue;
                };
                let neighbour = CellCoord::new(nx, ny);
                if let Some(target) = grid.cell(neighbour)
                    && target.is_free()
                    && target.is_scanned()
                    && let Some(target_index) = grid.index(neighbour)
                {
                    adjacency[index].push(target_index);
                }
            }
        }

        Self {
            width,
            height,
            adjacency,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    #[inline]
    pub fn index(&self, coord: CellCoord) -> Option<usize> {
        (coord.x < self.width && coord.y < self.height).then_some(coord.x * self.height + coord.y)
    }

    #[inline]
    pub fn coord(&self, index: usize) -> CellCoord {
        CellCoord::new(index / self.height, index % self.height)
    }

    /// Reachable neighbours of a node.
    pub fn neighbours(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_only_into_free_scanned_cells() {
        let mut grid = OccupancyGrid::new(3, 3).unwrap();
        grid.cell_mut(CellCoord::new(1, 2)).unwrap().unoccupied();
        grid.cell_mut(CellCoord::new(0, 1)).unwrap().occupied();
        // (1, 0) and (2, 1) stay unobserved

        let graph = NavGraph::from_grid(&grid);
        let centre = graph.index(CellCoord::new(1, 1)).unwrap();
        let up = graph.index(CellCoord::new(1, 2)).unwrap();
        assert_eq!(graph.neighbours(centre), &[up]);
        // Edges point into (1, 2) from its three neighbours only
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut grid = OccupancyGrid::new(2, 1).unwrap();
        grid.cell_mut(CellCoord::new(1, 0)).unwrap().unoccupied();
        let graph = NavGraph::from_grid(&grid);
        grid.cell_mut(CellCoord::new(1, 0)).unwrap().occupied();
        grid.cell_mut(CellCoord::new(1, 0)).unwrap().occupied();

        assert_eq!(graph.neighbours(0), &[1]);
        assert!(graph.neighbours(99).is_empty());
    }
}
