//! GyroReset: cancel accumulated heading drift against known landmarks.
//!
//! A neighbouring block or an arena wall has a known absolute heading. The
//! robot faces it, drives into flat contact (which squares the chassis up),
//! declares the gyro to read the landmark's map angle and backs off again.
//! Block neighbours are tried first, then walls, with a shared budget of
//! corrections per run.

use super::{Behavior, Control, Priority, SuppressFlag};
use crate::arbitrator::Watch;
use crate::config::{GyroResetConfig, MotionConfig};
use crate::context::RobotContext;
use crate::error::Result;
use crate::grid::CellCoord;
use crate::motion::{MotionConvergence, Wait, await_motion};
use crate::utils::shortest_rotation;
use log::{debug, info, warn};
use std::time::Duration;

/// How a single landmark approach ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Approach {
    Corrected,
    InvalidReading,
    Suppressed,
}

pub struct GyroReset {
    suppressed: SuppressFlag,
    convergence: MotionConvergence,
    config: GyroResetConfig,
    linear_speed: f32,
    angular_speed: f32,
    last_reset_cell: Option<CellCoord>,
    corrections: usize,
}

impl GyroReset {
    pub fn new(config: &GyroResetConfig, motion: &MotionConfig) -> Self {
        Self {
            suppressed: SuppressFlag::default(),
            convergence: MotionConvergence::new(motion),
            config: config.clone(),
            linear_speed: motion.linear_speed,
            angular_speed: motion.angular_speed,
            last_reset_cell: None,
            corrections: 0,
        }
    }

    /// Cell where the last completed reset ran
    pub fn last_reset_cell(&self) -> Option<CellCoord> {
        self.last_reset_cell
    }

    fn budget_left(&self) -> bool {
        self.corrections < self.config.max_corrections
    }

    /// Settle, measure, touch the landmark, reset and return.
    ///
    /// `map_angle` is the landmark's absolute heading, `turned` the rotation
    /// made to face it, which is undone afterwards.
    fn approach(
        &mut self,
        robot: &mut RobotContext,
        watch: &Watch<'_>,
        map_angle: f32,
        turned: f32,
    ) -> Result<Approach> {
        self.corrections += 1;
        robot.report(self.name(), "Attempting gyro reset movement");
        robot
            .hardware_mut()
            .pause(Duration::from_millis(self.config.settle_ms));

        let distance = robot.hardware_mut().read_ultrasonic()?;
        if distance >= self.config.max_valid_distance_m {
            warn!(
                "GyroReset: invalid reading {:.3} m toward {:.0}, skipping",
                distance, map_angle
            );
            robot.report(self.name(), "INVALID DISTANCE READING ON GYRO RESET");
            return Ok(Approach::InvalidReading);
        }

        let contact_cm = distance * 100.0;
        robot.report(self.name(), format!("Gyro reset distance: {:.1}", contact_cm));

        robot.set_calibrating(true);
        robot.hardware_mut().travel(contact_cm, true)?;
        if await_motion(robot, watch, &self.suppressed) == Wait::Suppressed {
            robot.hardware_mut().stop()?;
            robot.set_calibrating(false);
            return Ok(Approach::Suppressed);
        }

        robot.reset_gyro(map_angle)?;

        // Back off the contact-to-centre distance, not the measured one
        robot
            .hardware_mut()
            .travel(-self.config.back_distance_cm, true)?;
        let wait = await_motion(robot, watch, &self.suppressed);
        robot.set_calibrating(false);
        if wait.is_suppressed() {
            robot.hardware_mut().stop()?;
            return Ok(Approach::Suppressed);
        }

        robot.report(self.name(), format!("Rotating back by {:.1}", -turned));
        robot.hardware_mut().rotate(-turned, true)?;
        if await_motion(robot, watch, &self.suppressed) == Wait::Suppressed {
            robot.hardware_mut().stop()?;
            return Ok(Approach::Suppressed);
        }
        debug!("GyroReset: corrected against {:.0}", map_angle);
        Ok(Approach::Corrected)
    }

    /// Use neighbouring blocks. Returns false when suppressed.
    fn block_pass(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<bool> {
        let current = robot.current_cell();
        let blocks = robot.grid().block_neighbours(current);
        if blocks.is_empty() {
            robot.report(self.name(), "No blocks to perform a gyro reset were found");
            return Ok(true);
        }

        robot.report(self.name(), "BLOCK RESET SEQUENCE STARTED");
        for block in blocks {
            if !self.budget_left() {
                robot.report(self.name(), "Correction budget used up");
                return Ok(true);
            }

            let start = robot.angle()?;
            let rotation =
                self.convergence
                    .rotate_towards_cell(robot, block, watch, &self.suppressed)?;
            if rotation.is_suppressed() {
                return Ok(false);
            }
            let map_angle = robot.grid().angle_to_cell(current, block);
            let turned = shortest_rotation(robot.angle()? - start);
            robot.report(
                self.name(),
                format!(
                    "Using block {} map angle {:.0} turned {:.1}",
                    block, map_angle, turned
                ),
            );

            if self.approach(robot, watch, map_angle, turned)? == Approach::Suppressed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Use the arena walls the current cell touches. Returns false when suppressed.
    fn wall_pass(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<bool> {
        let current = robot.current_cell();
        let headings = robot.grid().wall_headings(current);
        if headings.is_empty() {
            robot.report(self.name(), "No wall to perform a gyro reset was found");
            return Ok(true);
        }

        robot.report(self.name(), "WALL RESET SEQUENCE STARTED");
        for map_angle in headings {
            if !self.budget_left() {
                robot.report(self.name(), "Correction budget used up");
                return Ok(true);
            }

            let turned = shortest_rotation(map_angle - robot.angle()?);
            robot.report(
                self.name(),
                format!("Using wall at {:.0}, rotating {:.1}", map_angle, turned),
            );
            robot.hardware_mut().rotate(turned, true)?;
            if await_motion(robot, watch, &self.suppressed) == Wait::Suppressed {
                robot.hardware_mut().stop()?;
                return Ok(false);
            }

            if self.approach(robot, watch, map_angle, turned)? == Approach::Suppressed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn set_speeds(&self, robot: &mut RobotContext, linear: f32, angular: f32) -> Result<()> {
        let hardware = robot.hardware_mut();
        hardware.set_linear_speed(linear)?;
        hardware.set_angular_speed(angular)
    }
}

impl Behavior for GyroReset {
    fn name(&self) -> &'static str {
        "GyroReset"
    }

    fn priority(&self) -> Priority {
        Priority::GyroReset
    }

    fn wants_control(&self, robot: &RobotContext) -> bool {
        let current = robot.current_cell();
        robot.needs_gyro_reset()
            && self.last_reset_cell != robot.previous_cell()
            && (robot.grid().is_next_to_wall(current)
                || !robot.grid().block_neighbours(current).is_empty())
    }

    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        self.suppressed.clear();
        self.corrections = 0;
        robot.report(self.name(), "===== RESETTING GYRO SEQUENCE =====");

        self.set_speeds(
            robot,
            self.linear_speed / self.config.linear_speed_divisor,
            self.angular_speed / self.config.angular_speed_divisor,
        )?;

        let passes = self
            .block_pass(robot, watch)
            .and_then(|finished| {
                if finished {
                    self.wall_pass(robot, watch)
                } else {
                    Ok(false)
                }
            });

        robot.set_calibrating(false);
        self.set_speeds(robot, self.linear_speed, self.angular_speed)?;

        if passes? {
            self.last_reset_cell = Some(robot.current_cell());
            robot.set_needing_gyro_reset(false);
            info!(
                "GyroReset: {} correction(s) at {}, offset {:.1}",
                self.corrections,
                robot.current_cell(),
                robot.gyro_offset()
            );
            robot.report(self.name(), "===== GYRO RESET SEQUENCE END =====");
        } else {
            robot.report(self.name(), "Interrupted, reset still pending");
        }
        Ok(Control::Continue)
    }

    fn suppress(&self) {
        self.suppressed.raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaConfig, NoiseConfig, SimulationConfig};
    use crate::hardware::sim::{Arena, SimProbe, SimRobot};
    use crate::monitor::StatusBoard;
    use crate::telemetry::Telemetry;
    use crate::utils::wrap_heading;
    use approx::assert_relative_eq;

    /// Open 3x3 arena, robot driven up into (0, 1) and waiting for a reset.
    fn context_in_left_column() -> (RobotContext, SimProbe) {
        let sim = SimulationConfig {
            seed: 9,
            noise: NoiseConfig::disabled(),
            ..SimulationConfig::default()
        };
        let hardware = SimRobot::new(Arena::open(3, 3, 25.0), &sim, &MotionConfig::default());
        let probe = hardware.probe();
        let arena = ArenaConfig {
            width: 3,
            height: 3,
            cell_size_cm: 25.0,
        };
        let mut robot =
            RobotContext::new(Box::new(hardware), &arena, Telemetry::new(512), StatusBoard::new())
                .unwrap();
        robot.hardware_mut().travel(25.0, false).unwrap();
        robot.set_current_cell(CellCoord::new(0, 1)).unwrap();
        robot.set_needing_gyro_reset(true);
        (robot, probe)
    }

    fn behavior() -> GyroReset {
        GyroReset::new(&GyroResetConfig::default(), &MotionConfig::default())
    }

    #[test]
    fn test_wall_reset_returns_to_heading_and_cell() {
        let (mut robot, probe) = context_in_left_column();
        let mut reset = behavior();
        assert!(reset.wants_control(&robot));

        reset.act(&mut robot, &Watch::unwatched()).unwrap();

        assert!(!robot.needs_gyro_reset());
        assert!(!robot.is_calibrating());
        assert_eq!(reset.last_reset_cell(), Some(CellCoord::new(0, 1)));
        // Left wall is at 270 degrees
        assert_relative_eq!(robot.gyro_offset(), -90.0);
        assert_relative_eq!(robot.angle().unwrap(), 0.0, epsilon = 0.5);

        let pose = probe.true_pose();
        assert_relative_eq!(pose.x, 12.5, epsilon = 0.5);
        assert_eq!(probe.true_cell(), Some(CellCoord::new(0, 1)));
        assert!(!robot.any_bump_pressed());
    }

    /// Believed minus true heading
    fn heading_error(robot: &mut RobotContext, probe: &SimProbe) -> f32 {
        let believed = robot.angle().unwrap();
        shortest_rotation(believed - wrap_heading(probe.true_pose().heading))
    }

    #[test]
    fn test_wall_contact_removes_heading_error() {
        let (mut robot, probe) = context_in_left_column();
        probe.drift_gyro(4.0);
        assert_relative_eq!(heading_error(&mut robot, &probe), 4.0, epsilon = 0.01);

        behavior().act(&mut robot, &Watch::unwatched()).unwrap();

        // Pressed square against the left wall, the gyro now agrees with the chassis
        assert!(heading_error(&mut robot, &probe).abs() < 0.5);
        assert_relative_eq!(probe.true_pose().x, 12.5, epsilon = 0.5);
        assert!(!robot.needs_gyro_reset());
    }

    #[test]
    fn test_same_previous_cell_is_not_reset_twice() {
        let (mut robot, _probe) = context_in_left_column();
        let mut reset = behavior();
        reset.act(&mut robot, &Watch::unwatched()).unwrap();

        robot.hardware_mut().travel(25.0, false).unwrap();
        robot.set_current_cell(CellCoord::new(0, 2)).unwrap();
        robot.set_needing_gyro_reset(true);
        assert!(!reset.wants_control(&robot));
    }

    #[test]
    fn test_phantom_block_reading_is_skipped() {
        let (mut robot, _probe) = context_in_left_column();
        // Believed blocked, physically open: the reading runs to the far wall
        let phantom = robot.grid_mut().cell_mut(CellCoord::new(1, 1)).unwrap();
        phantom.occupied();
        phantom.occupied();

        let mut reset = behavior();
        reset.act(&mut robot, &Watch::unwatched()).unwrap();

        // Only the wall correction reset the gyro; the turn toward the
        // phantom block is not undone
        assert_relative_eq!(robot.gyro_offset(), -90.0);
        assert_relative_eq!(robot.angle().unwrap(), 90.0, epsilon = 0.5);
        assert!(!robot.needs_gyro_reset());
    }

    #[test]
    fn test_hardware_error_leaves_reset_pending() {
        let (mut robot, _probe) = context_in_left_column();
        robot.hardware_mut().close().unwrap();
        let mut reset = behavior();

        assert!(reset.act(&mut robot, &Watch::unwatched()).is_err());
        assert!(robot.needs_gyro_reset());
        assert!(!robot.is_calibrating());
    }
}
