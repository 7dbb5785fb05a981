//! Rotate until the gyro confirms the requested turn.
//!
//! Wheel slip makes a commanded rotation land short or long. After each
//! attempt the achieved turn is measured with the gyro; while it differs from
//! the requested turn by more than the tolerance, the remaining turn toward
//! the target is reissued. The number of attempts per call is capped and the
//! residual error is accepted once the cap is hit.

use super::{Wait, await_motion};
use crate::arbitrator::Watch;
use crate::behaviors::SuppressFlag;
use crate::config::MotionConfig;
use crate::context::RobotContext;
use crate::error::Result;
use crate::grid::CellCoord;
use crate::utils::shortest_rotation;
use log::{trace, warn};

/// Outcome of a heading convergence call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rotation {
    /// Within tolerance after `attempts` rotations (0 when already aligned)
    Aligned { attempts: u32 },
    /// Attempt cap reached; the remaining error is kept
    Accepted { attempts: u32, residual_deg: f32 },
    /// A higher-priority behavior took over mid-turn
    Suppressed,
}

impl Rotation {
    #[inline]
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Rotation::Suppressed)
    }
}

/// Bounded-retry heading controller.
#[derive(Clone, Debug)]
pub struct MotionConvergence {
    tolerance_deg: f32,
    max_attempts: u32,
}

impl MotionConvergence {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            tolerance_deg: config.heading_tolerance_deg,
            max_attempts: config.max_rotation_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Turn to an absolute heading.
    pub fn rotate_to_heading(
        &self,
        robot: &mut RobotContext,
        target: f32,
        watch: &Watch<'_>,
        flag: &SuppressFlag,
    ) -> Result<Rotation> {
        let mut attempts = 0;
        loop {
            let start = robot.angle()?;
            let requested = shortest_rotation(target - start);
            if requested.round() == 0.0 {
                return Ok(Rotation::Aligned { attempts });
            }

            robot.hardware_mut().rotate(requested, true)?;
            attempts += 1;
            if await_motion(robot, watch, flag) == Wait::Suppressed {
                robot.hardware_mut().stop()?;
                return Ok(Rotation::Suppressed);
            }

            let end = robot.angle()?;
            let achieved = shortest_rotation(end - start);
            let discrepancy = (requested - achieved).abs().round();
            trace!(
                "MotionConvergence: attempt {} requested {:.1} achieved {:.1}",
                attempts, requested, achieved
            );
            if discrepancy <= self.tolerance_deg {
                return Ok(Rotation::Aligned { attempts });
            }
            if attempts >= self.max_attempts {
                let residual_deg = shortest_rotation(target - end);
                warn!(
                    "MotionConvergence: accepting {:.1} deg residual toward {:.0} after {} attempts",
                    residual_deg, target, attempts
                );
                return Ok(Rotation::Accepted {
                    attempts,
                    residual_deg,
                });
            }
        }
    }

    /// Turn to face an adjacent cell.
    pub fn rotate_towards_cell(
        &self,
        robot: &mut RobotContext,
        cell: CellCoord,
        watch: &Watch<'_>,
        flag: &SuppressFlag,
    ) -> Result<Rotation> {
        let target = robot.grid().angle_to_cell(robot.current_cell(), cell);
        self.rotate_to_heading(robot, target, watch, flag)
    }

    /// Turn back to heading zero (facing +Y).
    pub fn rotate_forward(
        &self,
        robot: &mut RobotContext,
        watch: &Watch<'_>,
        flag: &SuppressFlag,
    ) -> Result<Rotation> {
        self.rotate_to_heading(robot, 0.0, watch, flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaConfig, NoiseConfig, SimulationConfig};
    use crate::hardware::sim::{Arena, SimRobot};
    use crate::hardware::{BumpSide, Hardware, Point2D};
    use crate::monitor::StatusBoard;
    use crate::telemetry::Telemetry;
    use std::time::Duration;

    fn context_with(hardware: Box<dyn Hardware>) -> RobotContext {
        let arena = ArenaConfig {
            width: 3,
            height: 3,
            cell_size_cm: 25.0,
        };
        RobotContext::new(hardware, &arena, Telemetry::new(256), StatusBoard::new()).unwrap()
    }

    fn sim_context(noise: NoiseConfig, seed: u64) -> RobotContext {
        let sim = SimulationConfig {
            seed,
            noise,
            ..SimulationConfig::default()
        };
        let robot = SimRobot::new(Arena::open(3, 3, 25.0), &sim, &MotionConfig::default());
        context_with(Box::new(robot))
    }

    /// Drive train whose wheels never turn the robot.
    struct SeizedDrive {
        moving_polls: u32,
    }

    impl Hardware for SeizedDrive {
        fn bump_pressed(&self, _side: BumpSide) -> bool {
            false
        }
        fn escape_pressed(&self) -> bool {
            false
        }
        fn read_ultrasonic(&mut self) -> Result<f32> {
            Ok(1.0)
        }
        fn read_gyro(&mut self) -> Result<f32> {
            Ok(0.0)
        }
        fn reset_gyro(&mut self) -> Result<()> {
            Ok(())
        }
        fn rotate(&mut self, _degrees: f32, _immediate_return: bool) -> Result<()> {
            self.moving_polls = 2;
            Ok(())
        }
        fn travel(&mut self, _distance_cm: f32, _immediate_return: bool) -> Result<()> {
            Ok(())
        }
        fn is_moving(&mut self) -> bool {
            if self.moving_polls > 0 {
                self.moving_polls -= 1;
                true
            } else {
                false
            }
        }
        fn stop(&mut self) -> Result<()> {
            self.moving_polls = 0;
            Ok(())
        }
        fn set_linear_speed(&mut self, _speed: f32) -> Result<()> {
            Ok(())
        }
        fn set_angular_speed(&mut self, _speed: f32) -> Result<()> {
            Ok(())
        }
        fn aim_scanner(&mut self, _degrees: f32) -> Result<()> {
            Ok(())
        }
        fn is_scanner_moving(&mut self) -> bool {
            false
        }
        fn odometry(&self) -> Point2D {
            Point2D::default()
        }
        fn pause(&mut self, _duration: Duration) {}
        fn wait_for_acknowledge(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exact_rotation_converges_first_attempt() {
        let mut robot = sim_context(NoiseConfig::disabled(), 1);
        let convergence = MotionConvergence::new(&MotionConfig::default());
        let flag = SuppressFlag::default();

        let outcome = convergence
            .rotate_to_heading(&mut robot, 90.0, &Watch::unwatched(), &flag)
            .unwrap();
        assert_eq!(outcome, Rotation::Aligned { attempts: 1 });
        assert!((robot.angle().unwrap() - 90.0).abs() < 0.5);
    }

    #[test]
    fn test_already_aligned_needs_no_attempt() {
        let mut robot = sim_context(NoiseConfig::disabled(), 1);
        let convergence = MotionConvergence::new(&MotionConfig::default());
        let outcome = convergence
            .rotate_forward(&mut robot, &Watch::unwatched(), &SuppressFlag::default())
            .unwrap();
        assert_eq!(outcome, Rotation::Aligned { attempts: 0 });
    }

    #[test]
    fn test_slip_is_corrected_within_cap() {
        let noise = NoiseConfig {
            rotation_slip: 0.15,
            ..NoiseConfig::disabled()
        };
        let convergence = MotionConvergence::new(&MotionConfig::default());
        for seed in 1..=20 {
            let mut robot = sim_context(noise.clone(), seed);
            let outcome = convergence
                .rotate_to_heading(&mut robot, 270.0, &Watch::unwatched(), &SuppressFlag::default())
                .unwrap();
            match outcome {
                Rotation::Aligned { attempts } => {
                    assert!(attempts >= 1 && attempts <= convergence.max_attempts());
                    let error = shortest_rotation(270.0 - robot.angle().unwrap());
                    assert!(error.abs() <= 2.5, "seed {} error {}", seed, error);
                }
                other => panic!("seed {} did not converge: {:?}", seed, other),
            }
        }
    }

    #[test]
    fn test_seized_drive_stops_at_attempt_cap() {
        let mut robot = context_with(Box::new(SeizedDrive { moving_polls: 0 }));
        let convergence = MotionConvergence::new(&MotionConfig::default());
        let outcome = convergence
            .rotate_to_heading(&mut robot, 90.0, &Watch::unwatched(), &SuppressFlag::default())
            .unwrap();
        assert_eq!(
            outcome,
            Rotation::Accepted {
                attempts: 33,
                residual_deg: 90.0
            }
        );
    }

    #[test]
    fn test_raised_flag_suppresses_rotation() {
        let mut robot = sim_context(NoiseConfig::disabled(), 1);
        let convergence = MotionConvergence::new(&MotionConfig::default());
        let flag = SuppressFlag::default();
        flag.raise();
        let outcome = convergence
            .rotate_to_heading(&mut robot, 180.0, &Watch::unwatched(), &flag)
            .unwrap();
        assert!(outcome.is_suppressed());
        assert!(!robot.hardware_mut().is_moving());
    }
}
