//! Cooperative motion waits and bounded heading convergence.
//!
//! Every blocking wait in a behavior goes through [`await_motion`] or
//! [`await_scanner`], which poll the hardware and the behavior's suppression
//! flag once per iteration.

mod convergence;

pub use convergence::{MotionConvergence, Rotation};

use crate::arbitrator::Watch;
use crate::behaviors::SuppressFlag;
use crate::context::RobotContext;
use std::thread;

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    Completed,
    Suppressed,
}

impl Wait {
    #[inline]
    pub fn is_suppressed(self) -> bool {
        self == Wait::Suppressed
    }
}

/// Wait for the current rotate/travel command to finish.
pub fn await_motion(robot: &mut RobotContext, watch: &Watch<'_>, flag: &SuppressFlag) -> Wait {
    loop {
        if !robot.hardware_mut().is_moving() {
            return Wait::Completed;
        }
        if watch.poll(robot, flag) {
            return Wait::Suppressed;
        }
        thread::yield_now();
    }
}

/// Wait for the ultrasonic turret to reach its target.
pub fn await_scanner(robot: &mut RobotContext, watch: &Watch<'_>, flag: &SuppressFlag) -> Wait {
    loop {
        if !robot.hardware_mut().is_scanner_moving() {
            return Wait::Completed;
        }
        if watch.poll(robot, flag) {
            return Wait::Suppressed;
        }
        thread::yield_now();
    }
}
