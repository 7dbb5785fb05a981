//! Drive: move to the next unexplored cell.
//!
//! An adjacent free, unvisited, scanned cell is preferred. Otherwise the
//! robot plans an A* route to the first reachable frontier cell in grid order
//! and walks it. With no frontier left the lap is complete.

use super::{Behavior, Control, Priority, SuppressFlag};
use crate::arbitrator::Watch;
use crate::config::MotionConfig;
use crate::context::RobotContext;
use crate::error::Result;
use crate::grid::CellCoord;
use crate::motion::{MotionConvergence, Wait, await_motion};
use crate::planning::{PlannedPath, WaypointResolver};
use log::{debug, info};

/// Result of a single cell-to-cell move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Arrived,
    Suppressed,
}

pub struct Drive {
    suppressed: SuppressFlag,
    convergence: MotionConvergence,
    cell_size_cm: f32,
    path_clearance_cm: f32,
}

impl Drive {
    pub fn new(motion: &MotionConfig, cell_size_cm: f32) -> Self {
        Self {
            suppressed: SuppressFlag::default(),
            convergence: MotionConvergence::new(motion),
            cell_size_cm,
            path_clearance_cm: motion.path_clearance_cm,
        }
    }

    /// Face `next`, travel `distance_cm` and commit the cell on arrival.
    fn step_to(
        &self,
        robot: &mut RobotContext,
        watch: &Watch<'_>,
        next: CellCoord,
        distance_cm: f32,
    ) -> Result<Step> {
        let rotation = self
            .convergence
            .rotate_towards_cell(robot, next, watch, &self.suppressed)?;
        if rotation.is_suppressed() {
            return Ok(Step::Suppressed);
        }

        robot.hardware_mut().travel(distance_cm, true)?;
        let wait = await_motion(robot, watch, &self.suppressed);
        robot.hardware_mut().stop()?;
        if wait == Wait::Suppressed {
            robot.report(self.name(), format!("Move to {} interrupted", next));
            return Ok(Step::Suppressed);
        }

        robot.set_current_cell(next)?;
        Ok(Step::Arrived)
    }

    /// First frontier cell with a route from the current cell.
    fn plan_to_frontier(&self, robot: &RobotContext) -> Option<(CellCoord, PlannedPath)> {
        let current = robot.current_cell();
        let resolver = WaypointResolver::new(robot.grid());
        robot
            .grid()
            .scanned_unvisited()
            .into_iter()
            .find_map(|goal| resolver.calculate_path(current, goal).map(|path| (goal, path)))
    }

    fn explore(&self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<()> {
        let current = robot.current_cell();
        robot.report(self.name(), format!("Current cell: {}", current));

        if let Some(&next) = robot.grid().free_unvisited_neighbours(current).first() {
            robot.report(
                self.name(),
                format!("Free unvisited neighbour found, picked {}", next),
            );
            self.step_to(robot, watch, next, self.cell_size_cm)?;
            return Ok(());
        }

        robot.report(
            self.name(),
            "No free unvisited neighbour, attempting to pathfind",
        );
        if robot.grid().scanned_unvisited().is_empty() {
            robot.report(self.name(), "No scanned unvisited cells, robot is blocked");
            info!("Drive: no frontier left after {} moves", robot.cells_moved());
            robot.set_lap_completed(true);
            return Ok(());
        }

        let Some((goal, path)) = self.plan_to_frontier(robot) else {
            robot.report(self.name(), "No paths were found, end of lap");
            info!("Drive: frontier unreachable, lap completed");
            robot.set_lap_completed(true);
            return Ok(());
        };

        robot.report(
            self.name(),
            format!("Path to {} with {} steps", goal, path.waypoints.len()),
        );
        debug!(
            "Drive: path cost {} after expanding {} nodes",
            path.cost, path.nodes_expanded
        );
        let step_cm = self.cell_size_cm - self.path_clearance_cm;
        for waypoint in path.waypoints {
            robot.report(self.name(), format!("(Path) moving to {}", waypoint));
            if self.step_to(robot, watch, waypoint, step_cm)? == Step::Suppressed {
                return Ok(());
            }
        }
        robot.report(self.name(), ">> Path completed");
        Ok(())
    }
}

impl Behavior for Drive {
    fn name(&self) -> &'static str {
        "Drive"
    }

    fn priority(&self) -> Priority {
        Priority::Drive
    }

    fn wants_control(&self, robot: &RobotContext) -> bool {
        !robot.is_scanning()
    }

    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        self.suppressed.clear();
        let outcome = self.explore(robot, watch);
        robot.hardware_mut().stop()?;
        robot.set_scanning(true);
        outcome.map(|()| Control::Continue)
    }

    fn suppress(&self) {
        self.suppressed.raise();
    }
}
