//! Collision: back away from an unexpected contact.
//!
//! The robot returns along its track by the distance odometry reports since
//! the last committed cell, then uses the ultrasonic reading straight ahead to
//! re-centre itself when it ended up further than half a cell from the
//! obstacle. The forward re-centring never gives back the whole back-off, and
//! it is skipped when the reading is too long to be the obstacle that was hit
//! (a bumper edge catching a corner the sensor cannot see).

use super::{Behavior, Control, Priority, SuppressFlag};
use crate::arbitrator::Watch;
use crate::config::CollisionConfig;
use crate::context::RobotContext;
use crate::error::Result;
use crate::motion::await_motion;
use log::{debug, warn};

pub struct Collision {
    suppressed: SuppressFlag,
    half_cell_cm: f32,
    min_backoff_cm: f32,
    trusted_range_cm: f32,
}

impl Collision {
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            suppressed: SuppressFlag::default(),
            half_cell_cm: config.half_cell_cm,
            min_backoff_cm: config.min_backoff_cm,
            trusted_range_cm: config.trusted_range_cm,
        }
    }
}

impl Behavior for Collision {
    fn name(&self) -> &'static str {
        "Collision"
    }

    fn priority(&self) -> Priority {
        Priority::Collision
    }

    fn wants_control(&self, robot: &RobotContext) -> bool {
        !robot.is_calibrating() && robot.any_bump_pressed()
    }

    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control> {
        self.suppressed.clear();
        robot.report(self.name(), "----> ROBOT HAS COLLIDED");
        warn!("Collision: bumper contact near {}", robot.current_cell());

        let travelled = robot
            .hardware()
            .odometry()
            .distance(robot.current_location());
        let backoff = travelled.max(self.min_backoff_cm);
        robot.report(
            self.name(),
            format!("Backing off {:.1} cm (odometry {:.1} cm)", backoff, travelled),
        );

        robot.hardware_mut().travel(-backoff, true)?;
        let wait = await_motion(robot, watch, &self.suppressed);
        robot.hardware_mut().stop()?;
        if wait.is_suppressed() {
            return Ok(Control::Continue);
        }

        if robot.any_bump_pressed() {
            robot.report(self.name(), "Still in contact, skipping re-centring");
            return Ok(Control::Continue);
        }

        let ahead_cm = robot.hardware_mut().read_ultrasonic()? * 100.0;
        if ahead_cm <= self.half_cell_cm {
            return Ok(Control::Continue);
        }
        if ahead_cm > self.trusted_range_cm {
            debug!(
                "Collision: {:.1} cm ahead is past the obstacle, not re-centring",
                ahead_cm
            );
            return Ok(Control::Continue);
        }

        // Stop at least min_backoff short of the contact point
        let adjust = (ahead_cm - self.half_cell_cm).min(backoff - self.min_backoff_cm);
        if adjust > 0.0 {
            robot.report(self.name(), format!("Re-centring forward {:.1} cm", adjust));
            robot.hardware_mut().travel(adjust, true)?;
            await_motion(robot, watch, &self.suppressed);
            robot.hardware_mut().stop()?;
        }
        Ok(Control::Continue)
    }

    fn suppress(&self) {
        self.suppressed.raise();
    }
}
