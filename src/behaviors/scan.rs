//! Scan: observe every unvisited neighbour with the ultrasonic turret.

use super::{Behavior, Control, Priority, SuppressFlag};
use crate::arbitrator::Watch;
use crate::config::ScanConfig;
use crate::context::RobotContext;
use crate::error::Result;
use crate::grid::CellCoord;
use crate::motion::{Wait, await_scanner};
use crate::utils::shortest_rotation;
use log::debug;
use std::time::Duration;

pub struct Scan {
    suppressed: SuppressFlag,
    occupied_distance_m: f32,
    settle: Duration,
    dwell: Duration,
}

impl Scan {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            suppressed: SuppressFlag::default(),
            occupied_distance_m: config.occupied_distance_m,
            settle: Duration::from_millis(config.settle_ms),
            dwell: Duration::from_millis(config.dwell_ms),
        }
    }

    /// Aim the turret at `target`, take one reading and re-centre.
    ///
    /// Returns `None` when suppressed before a reading was taken.
    fn measure(
        &self,
        robot: &mut RobotContext,
        target: CellCoord,
        watch: &Watch<'_>,
    ) -> Result<Option<f32>> {
        let map_angle = robot.grid().angle_to_cell(robot.current_cell(), target);
        let heading = robot.angle()?;
        let aim = shortest_rotation(map_angle - heading);
        robot.report(
            self.name(),
            format!("Gyro {:.1}, map {:.0}, turret {:.1}", heading, map_angle, aim),
        );

        robot.hardware_mut().aim_scanner(aim)?;
        if await_scanner(robot, watch, &self.suppressed) == Wait::Suppressed {
            return Ok(None);
        }
        robot.hardware_mut().pause(self.settle);
        let distance = robot.hardware_mut().read_ultrasonic()?;

        robot.hardware_mut().aim_scanner(0.0)?;
        await_scanner(robot, watch, &self.suppressed);
        Ok(Some(distance))
    }

    fn recentre(&self, robot: &mut RobotContext) -> Result<()> {
        robot.hardware_mut().aim_scanner(0.0)?;
        while robot.hardware_mut().is_scanner_moving() {
            std::thread::yield_now();
        }
        Ok(())
    }
}

impl Behavior for Scan {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn priority(&self) -> Priority {
        Priority::Scan
    }

    fn wants_control(&self, robot: &RobotContext) -> bool {
        robot.is_scanning()
    }

    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        self.suppressed.clear();
        let current = robot.current_cell();
        let targets = robot.grid().scan_neighbours(current);

        for target in targets {
            robot.report(self.name(), format!("===> Scanning cell {}", target));
            let Some(distance) = self.measure(robot, target, watch)? else {
                self.recentre(robot)?;
                robot.report(self.name(), "Interrupted, sweep will repeat");
                return Ok(Control::Continue);
            };

            let occupied = distance <= self.occupied_distance_m;
            let cell = robot.grid_mut().try_cell_mut(target)?;
            if occupied {
                cell.occupied();
            } else {
                cell.unoccupied();
            }
            let probability = cell.probability();
            debug!(
                "Scan: {} at {:.3} m -> {} (p={:.2})",
                target,
                distance,
                if occupied { "occupied" } else { "free" },
                probability
            );
            robot.report(
                self.name(),
                format!(
                    "Distance {:.3} m, cell {}",
                    distance,
                    if occupied { "occupied" } else { "unoccupied" }
                ),
            );

            if self.suppressed.is_raised() {
                self.recentre(robot)?;
                return Ok(Control::Continue);
            }
            robot.hardware_mut().pause(self.dwell);
        }

        if robot.previous_cell().is_some_and(|previous| previous != current) {
            robot.set_needing_gyro_reset(true);
        }
        robot.set_scanning(false);
        Ok(Control::Continue)
    }

    fn suppress(&self) {
        self.suppressed.raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviors::Stop;
    use crate::config::{ArenaConfig, MotionConfig, NoiseConfig, SimulationConfig};
    use crate::hardware::sim::{Arena, SimProbe, SimRobot};
    use crate::monitor::StatusBoard;
    use crate::telemetry::Telemetry;

    /// 3x3 arena with a block at (1, 0)
    fn context() -> (RobotContext, SimProbe) {
        let arena = Arena::from_layout(&["...", "...", ".#."], 25.0).unwrap();
        let sim = SimulationConfig {
            seed: 5,
            noise: NoiseConfig::disabled(),
            ..SimulationConfig::default()
        };
        let robot = SimRobot::new(arena, &sim, &MotionConfig::default());
        let probe = robot.probe();
        let arena = ArenaConfig {
            width: 3,
            height: 3,
            cell_size_cm: 25.0,
        };
        let context =
            RobotContext::new(Box::new(robot), &arena, Telemetry::new(256), StatusBoard::new())
                .unwrap();
        (context, probe)
    }

    #[test]
    fn test_sweep_marks_neighbours() {
        let (mut robot, _probe) = context();
        let mut scan = Scan::new(&ScanConfig::default());
        assert!(scan.wants_control(&robot));

        let control = scan.act(&mut robot, &Watch::unwatched()).unwrap();
        assert_eq!(control, Control::Continue);

        let up = robot.grid().cell(CellCoord::new(0, 1)).unwrap();
        assert_eq!((up.m(), up.c()), (-1, 1));
        assert!(up.is_free());
        let right = robot.grid().cell(CellCoord::new(1, 0)).unwrap();
        assert_eq!((right.m(), right.c()), (1, 1));
        assert!(right.is_block());

        assert!(!robot.is_scanning());
        // Still in the starting cell, so no gyro reset is requested
        assert!(!robot.needs_gyro_reset());
        assert!(!scan.wants_control(&robot));
    }

    #[test]
    fn test_gyro_reset_requested_after_moving() {
        let (mut robot, _probe) = context();
        robot.hardware_mut().travel(25.0, false).unwrap();
        robot.set_current_cell(CellCoord::new(0, 1)).unwrap();
        robot.set_scanning(true);

        Scan::new(&ScanConfig::default())
            .act(&mut robot, &Watch::unwatched())
            .unwrap();
        assert!(robot.needs_gyro_reset());
        // (0, 0) is visited and not rescanned
        assert_eq!(robot.grid().cell(CellCoord::new(0, 0)).unwrap().c(), 1);
    }

    #[test]
    fn test_preempted_sweep_stays_armed() {
        let (mut robot, probe) = context();
        let higher: Vec<Box<dyn Behavior>> = vec![Box::new(Stop::new(&MotionConfig::default()))];
        probe.press_escape();

        let mut scan = Scan::new(&ScanConfig::default());
        scan.act(&mut robot, &Watch::new(&higher)).unwrap();

        // The turret already faced (0, 1); turning toward (1, 0) hit the poll point
        assert_eq!(robot.grid().cell(CellCoord::new(0, 1)).unwrap().c(), 1);
        assert_eq!(robot.grid().cell(CellCoord::new(1, 0)).unwrap().c(), 0);
        assert!(robot.is_scanning());
        assert!(!robot.hardware_mut().is_scanner_moving());
    }
}
