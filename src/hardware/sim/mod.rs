//! Simulated hardware: arena ground truth, noise and the robot driver.

mod arena;
mod noise;
mod robot;

pub use arena::Arena;
pub use noise::SimNoise;
pub use robot::{Pose, SimProbe, SimRobot};
