//! Subsumption behaviors.
//!
//! Priority from highest to lowest: [`Stop`], [`Collision`], [`Scan`],
//! [`GyroReset`], [`Drive`]. Each behavior owns a [`SuppressFlag`] that it
//! clears when it starts acting and checks at every blocking wait.

mod collision;
mod drive;
mod gyro_reset;
mod scan;
mod stop;

pub use collision::Collision;
pub use drive::Drive;
pub use gyro_reset::GyroReset;
pub use scan::Scan;
pub use stop::Stop;

use crate::arbitrator::Watch;
use crate::config::ExplorerConfig;
use crate::context::RobotContext;
use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fixed behavior priority; higher variants preempt lower ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Drive,
    GyroReset,
    Scan,
    Collision,
    Stop,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why the control loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// Exploration finished and the operator acknowledged
    LapCompleted,
    /// Forced shutdown from the escape button
    Aborted,
}

impl Halt {
    /// Process exit status for this halt
    pub fn exit_code(self) -> u8 {
        match self {
            Halt::LapCompleted | Halt::Aborted => 1,
        }
    }
}

/// What the arbitrator should do after an `act()` returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Halt(Halt),
}

/// Cooperative cancellation signal for one behavior.
#[derive(Debug, Default)]
pub struct SuppressFlag(AtomicBool);

impl SuppressFlag {
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A subsumption behavior.
pub trait Behavior {
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority;

    /// Whether this behavior should run now. Must not have side effects.
    fn wants_control(&self, robot: &RobotContext) -> bool;

    /// Run to completion or until suppressed. `watch` reports preemption by
    /// higher-priority behaviors at each poll point.
    fn act(&mut self, robot: &mut RobotContext, watch: &Watch<'_>) -> Result<Control>;

    /// Ask a running or future `act()` to stop at its next poll point.
    fn suppress(&self);
}

/// The five exploration behaviors, configured.
pub fn standard_behaviors(config: &ExplorerConfig) -> Vec<Box<dyn Behavior>> {
    vec![
        Box::new(Stop::new(&config.motion)),
        Box::new(Collision::new(&config.collision)),
        Box::new(Scan::new(&config.scan)),
        Box::new(GyroReset::new(&config.gyro_reset, &config.motion)),
        Box::new(Drive::new(&config.motion, config.arena.cell_size_cm)),
    ]
}
