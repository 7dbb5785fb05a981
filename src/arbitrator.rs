//! Fixed-priority subsumption arbitration.
//!
//! Each tick selects the highest-priority behavior that wants control,
//! suppresses everything below it and runs the winner to completion on the
//! calling thread. While it runs, the winner consults a [`Watch`] over the
//! behaviors above it at every poll point; a higher behavior wanting control
//! raises the winner's suppression flag.

use crate::behaviors::{Behavior, Control, Halt, SuppressFlag};
use crate::context::RobotContext;
use crate::error::{ExplorerError, Result};
use log::{debug, error, info, trace};
use std::thread;
use std::time::Duration;

/// Sleep between ticks when nothing wants control.
const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Preemption check over the behaviors that outrank the active one.
pub struct Watch<'a> {
    higher: &'a [Box<dyn Behavior>],
}

impl<'a> Watch<'a> {
    pub fn new(higher: &'a [Box<dyn Behavior>]) -> Self {
        Self { higher }
    }

    /// A watch with nothing above it. Only the behavior's own flag can interrupt.
    pub fn unwatched() -> Watch<'static> {
        Watch { higher: &[] }
    }

    /// Name of the first higher behavior that wants control now
    pub fn preempted(&self, robot: &RobotContext) -> Option<&'static str> {
        self.higher
            .iter()
            .find(|behavior| behavior.wants_control(robot))
            .map(|behavior| behavior.name())
    }

    /// Poll point: true when the active behavior must stop.
    ///
    /// Raises `flag` if a higher behavior wants control.
    pub fn poll(&self, robot: &RobotContext, flag: &SuppressFlag) -> bool {
        if flag.is_raised() {
            return true;
        }
        if let Some(name) = self.preempted(robot) {
            trace!("Watch: preempted by {}", name);
            flag.raise();
            return true;
        }
        false
    }
}

/// Outcome of one arbitration cycle.
#[derive(Debug)]
pub enum Tick {
    /// No behavior wanted control
    Idle,
    /// A behavior ran to completion or suppression
    Ran {
        behavior: &'static str,
        control: Control,
    },
    /// A behavior's `act()` failed; the loop carries on
    Failed {
        behavior: &'static str,
        error: ExplorerError,
    },
}

/// Runs behaviors by strict fixed priority.
pub struct Arbitrator {
    behaviors: Vec<Box<dyn Behavior>>,
    ticks: u64,
}

impl Arbitrator {
    /// Order behaviors highest priority first. Two behaviors may not share a priority.
    pub fn new(mut behaviors: Vec<Box<dyn Behavior>>) -> Result<Self> {
        behaviors.sort_by_key(|behavior| std::cmp::Reverse(behavior.priority()));
        if let Some(pair) = behaviors
            .windows(2)
            .find(|pair| pair[0].priority() == pair[1].priority())
        {
            return Err(ExplorerError::Config(format!(
                "behaviors {} and {} share priority {}",
                pair[0].name(),
                pair[1].name(),
                pair[0].priority()
            )));
        }
        info!(
            "Arbitrator: {}",
            behaviors
                .iter()
                .map(|behavior| behavior.name())
                .collect::<Vec<_>>()
                .join(" > ")
        );
        Ok(Self {
            behaviors,
            ticks: 0,
        })
    }

    /// Behavior names, highest priority first
    pub fn names(&self) -> Vec<&'static str> {
        self.behaviors.iter().map(|behavior| behavior.name()).collect()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One selection and run.
    pub fn tick(&mut self, robot: &mut RobotContext) -> Tick {
        self.ticks += 1;
        let Some(index) = self
            .behaviors
            .iter()
            .position(|behavior| behavior.wants_control(robot))
        else {
            return Tick::Idle;
        };

        let (higher, rest) = self.behaviors.split_at_mut(index);
        let Some((active, lower)) = rest.split_first_mut() else {
            return Tick::Idle;
        };
        for behavior in lower.iter() {
            behavior.suppress();
        }

        let name = active.name();
        debug!("Arbitrator: tick {} -> {}", self.ticks, name);
        let watch = Watch::new(higher);
        match active.act(robot, &watch) {
            Ok(control) => Tick::Ran {
                behavior: name,
                control,
            },
            Err(error) => {
                error!("Arbitrator: {} failed: {}", name, error);
                robot.report(name, format!("ERROR: {}", error));
                Tick::Failed {
                    behavior: name,
                    error,
                }
            }
        }
    }

    /// Loop until a behavior halts.
    pub fn run(&mut self, robot: &mut RobotContext) -> Halt {
        loop {
            if let Some(halt) = self.step(robot) {
                return halt;
            }
        }
    }

    /// Loop for at most `max_ticks` cycles.
    pub fn run_for(&mut self, robot: &mut RobotContext, max_ticks: u64) -> Option<Halt> {
        for _ in 0..max_ticks {
            if let Some(halt) = self.step(robot) {
                return Some(halt);
            }
        }
        info!("Arbitrator: stopped after {} ticks without a halt", max_ticks);
        None
    }

    fn step(&mut self, robot: &mut RobotContext) -> Option<Halt> {
        match self.tick(robot) {
            Tick::Ran {
                behavior,
                control: Control::Halt(halt),
            } => {
                info!("Arbitrator: {} halted ({:?})", behavior, halt);
                Some(halt)
            }
            Tick::Idle => {
                thread::sleep(IDLE_INTERVAL);
                None
            }
            Tick::Ran { .. } | Tick::Failed { .. } => None,
        }
    }
}
