//! Hardware abstraction consumed by the behaviors.
//!
//! Motion commands are issued non-blocking and observed through
//! [`Hardware::is_moving`]; callers poll it together with their suppression
//! flag. The only driver shipped is the simulator in [`sim`].

pub mod sim;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which front bumper switch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BumpSide {
    Left,
    Right,
}

/// Planar position in centimeters, from odometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: Point2D) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Sensors and actuators of the exploration robot.
pub trait Hardware: Send {
    /// Whether a bumper switch is closed
    fn bump_pressed(&self, side: BumpSide) -> bool;

    /// Whether the operator requested shutdown
    fn escape_pressed(&self) -> bool;

    /// Ultrasonic distance along the turret direction, in meters
    fn read_ultrasonic(&mut self) -> Result<f32>;

    /// Raw gyro heading in degrees since the last reset, clockwise, unwrapped
    fn read_gyro(&mut self) -> Result<f32>;

    /// Zero the gyro at the current heading
    fn reset_gyro(&mut self) -> Result<()>;

    /// Rotate in place, clockwise positive
    fn rotate(&mut self, degrees: f32, immediate_return: bool) -> Result<()>;

    /// Drive straight, negative distances reverse
    fn travel(&mut self, distance_cm: f32, immediate_return: bool) -> Result<()>;

    /// Whether a rotate/travel command is still executing
    fn is_moving(&mut self) -> bool;

    /// Abort the current motion command
    fn stop(&mut self) -> Result<()>;

    /// Linear speed in cm/s
    fn set_linear_speed(&mut self, speed: f32) -> Result<()>;

    /// Angular speed in deg/s
    fn set_angular_speed(&mut self, speed: f32) -> Result<()>;

    /// Turn the ultrasonic turret to an angle relative to the body
    fn aim_scanner(&mut self, degrees: f32) -> Result<()>;

    /// Whether the turret is still turning
    fn is_scanner_moving(&mut self) -> bool;

    /// Dead-reckoned position in centimeters
    fn odometry(&self) -> Point2D;

    /// Block for a while (simulated drivers advance their clock instead)
    fn pause(&mut self, duration: Duration);

    /// Wait for the operator to acknowledge (button press on the robot)
    fn wait_for_acknowledge(&mut self) -> Result<()>;

    /// Release sensors and motors
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_relative_eq!(a.distance(b), 5.0);
        assert_relative_eq!(b.distance(b), 0.0);
    }
}
