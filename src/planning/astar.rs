//! A* search over a [`NavGraph`].
//!
//! Edge cost is 1 and the heuristic is the Manhattan distance, so all costs
//! are integers. Per-node bookkeeping lives in an arena indexed by grid
//! position and is rebuilt for every search.

use super::graph::NavGraph;
use crate::grid::CellCoord;
use log::trace;

/// Cost of moving between adjacent cells.
const EDGE_COST: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum NodeState {
    #[default]
    Unseen,
    Open,
    Closed,
}

/// Search bookkeeping for one grid position.
#[derive(Clone, Copy, Debug, Default)]
struct SearchRecord {
    parent: Option<usize>,
    cost_from_start: u32,
    estimated_cost_to_goal: u32,
    state: NodeState,
}

impl SearchRecord {
    #[inline]
    fn total_cost(&self) -> u32 {
        self.cost_from_start + self.estimated_cost_to_goal
    }
}

/// Open list kept sorted by total cost. Equal costs keep insertion order.
#[derive(Debug, Default)]
struct OpenList {
    entries: Vec<usize>,
}

impl OpenList {
    fn insert(&mut self, node: usize, records: &[SearchRecord]) {
        let cost = records[node].total_cost();
        let at = self
            .entries
            .partition_point(|&other| records[other].total_cost() <= cost);
        self.entries.insert(at, node);
    }

    fn remove(&mut self, node: usize) {
        if let Some(pos) = self.entries.iter().position(|&n| n == node) {
            self.entries.remove(pos);
        }
    }

    fn pop_first(&mut self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }
}

/// A successful search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedPath {
    /// Cells to visit in order, excluding the start cell
    pub waypoints: Vec<CellCoord>,
    /// Sum of edge costs
    pub cost: u32,
    /// Nodes moved to the closed list during the search
    pub nodes_expanded: usize,
}

/// Run A* from `start` to `goal`. Returns None when the goal is unreachable.
pub(super) fn search(graph: &NavGraph, start: usize, goal: usize) -> Option<PlannedPath> {
    let goal_coord = graph.coord(goal);
    let heuristic = |node: usize| graph.coord(node).manhattan(goal_coord) as u32;

    let mut records = vec![SearchRecord::default(); graph.node_count()];
    let mut open = OpenList::default();
    let mut nodes_expanded = 0;

    records[start] = SearchRecord {
        parent: None,
        cost_from_start: 0,
        estimated_cost_to_goal: heuristic(start),
        state: NodeState::Open,
    };
    open.insert(start, &records);

    while let Some(current) = open.pop_first() {
        records[current].state = NodeState::Closed;
        nodes_expanded += 1;

        if current == goal {
            let waypoints = reconstruct(graph, &records, goal);
            trace!(
                "A*: reached {} after expanding {} nodes",
                goal_coord, nodes_expanded
            );
            return Some(PlannedPath {
                cost: records[goal].cost_from_start,
                waypoints,
                nodes_expanded,
            });
        }

        let cost = records[current].cost_from_start + EDGE_COST;
        for &neighbour in graph.neighbours(current) {
            let record = records[neighbour];
            let improves = cost < record.cost_from_start;
            match record.state {
                NodeState::Unseen => {}
                NodeState::Open if improves => open.remove(neighbour),
                NodeState::Closed if improves => {
                    trace!("A*: reopening {}", graph.coord(neighbour));
                }
                _ => continue,
            }
            records[neighbour] = SearchRecord {
                parent: Some(current),
                cost_from_start: cost,
                estimated_cost_to_goal: heuristic(neighbour),
                state: NodeState::Open,
            };
            open.insert(neighbour, &records);
        }
    }

    trace!(
        "A*: open list exhausted after {} nodes, {} unreachable",
        nodes_expanded, goal_coord
    );
    None
}

fn reconstruct(graph: &NavGraph, records: &[SearchRecord], goal: usize) -> Vec<CellCoord> {
    let mut path = Vec::new();
    let mut node = goal;
    while let Some(parent) = records[node].parent {
        path.push(graph.coord(node));
        node = parent;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_list_orders_by_cost_then_insertion() {
        let mut records = vec![SearchRecord::default(); 4];
        for (i, (g, h)) in [(2, 2), (1, 1), (0, 4), (3, 0)].into_iter().enumerate() {
            records[i].cost_from_start = g;
            records[i].estimated_cost_to_goal = h;
        }
        let mut open = OpenList::default();
        for i in 0..4 {
            open.insert(i, &records);
        }
        // totals: 4, 2, 4, 3
        assert_eq!(open.entries, vec![1, 3, 0, 2]);

        open.remove(3);
        assert_eq!(open.pop_first(), Some(1));
        assert_eq!(open.pop_first(), Some(0));
        assert_eq!(open.pop_first(), Some(2));
        assert_eq!(open.pop_first(), None);
    }
}
