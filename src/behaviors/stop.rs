//! Stop: terminal behavior on escape or lap completion.

use super::{Behavior, Control, Halt, Priority, SuppressFlag};
use crate::arbitrator::Watch;
use crate::config::MotionConfig;
use crate::context::RobotContext;
use crate::error::Result;
use crate::motion::MotionConvergence;
use log::info;

pub struct Stop {
    suppressed: SuppressFlag,
    convergence: MotionConvergence,
}

impl Stop {
    pub fn new(motion: &MotionConfig) -> Self {
        Self {
            suppressed: SuppressFlag::default(),
            convergence: MotionConvergence::new(motion),
        }
    }

    fn abort(&self, robot: &mut RobotContext) -> Result<Control> {
        robot.report(self.name(), "Exit requested, shutting down");
        robot.publish_map_rows();
        robot.telemetry().close();
        robot.hardware_mut().close()?;
        info!("Stop: forced shutdown after {} moves", robot.cells_moved());
        Ok(Control::Halt(Halt::Aborted))
    }

    fn finish_lap(&self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        let elapsed = robot.elapsed_ms();
        robot.report(self.name(), "LAP COMPLETED");
        robot.report(self.name(), format!("ELAPSED: {} ms", elapsed));
        info!(
            "Stop: lap completed in {} ms, {} moves, {} cells visited",
            elapsed,
            robot.cells_moved(),
            robot.grid().visited_count()
        );

        // Park facing the starting direction
        self.convergence
            .rotate_forward(robot, watch, &self.suppressed)?;

        robot.publish_map_rows();
        robot.publish_state();
        robot.announce("== LAP COMPLETED ==");
        robot.announce(format!("Time: {:.1}s", elapsed as f64 / 1000.0));
        robot.hardware_mut().wait_for_acknowledge()?;
        robot.telemetry().close();
        robot.hardware_mut().close()?;
        Ok(Control::Halt(Halt::LapCompleted))
    }
}

impl Behavior for Stop {
    fn name(&self) -> &'static str {
        "Stop"
    }

    fn priority(&self) -> Priority {
        Priority::Stop
    }

    fn wants_control(&self, robot: &RobotContext) -> bool {
        robot.hardware().escape_pressed() || robot.is_lap_completed()
    }

    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        self.suppressed.clear();
        robot.hardware_mut().stop()?;
        if robot.is_lap_completed() {
            self.finish_lap(robot, watch)
        } else {
            self.abort(robot)
        }
    }

    /// Nothing outranks Stop, so suppression never arrives from the arbitrator.
    fn suppress(&self) {
        self.suppressed.raise();
    }
}
