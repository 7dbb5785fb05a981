//! Grid Explorer - subsumption-controlled exploration of a cellular arena
//!
//! A small differential-drive robot explores a rectangular arena of square
//! cells, maps which cells are blocked with an ultrasonic turret and corrects
//! its gyro drift by touching known walls and blocks.
//!
//! ## Architecture
//!
//! - [`arbitrator`]: fixed-priority behavior selection with cooperative suppression
//! - [`behaviors`]: Stop > Collision > Scan > GyroReset > Drive
//! - [`context`]: the shared [`RobotContext`] the behaviors read and mutate
//! - [`grid`]: occupancy-probability grid with 4-connected neighbour queries
//! - [`planning`]: A* waypoint resolution over free, scanned cells
//! - [`motion`]: poll-driven waits and bounded-retry heading convergence
//! - [`hardware`]: the [`Hardware`] trait plus a simulated arena robot
//! - [`telemetry`]: length-prefixed JSON frames to TCP viewers
//! - [`monitor`]: status board rendered by a timer thread

pub mod arbitrator;
pub mod behaviors;
pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod hardware;
pub mod monitor;
pub mod motion;
pub mod planning;
pub mod telemetry;
pub mod utils;

pub use arbitrator::{Arbitrator, Tick, Watch};
pub use behaviors::{Behavior, Control, Halt, Priority, SuppressFlag, standard_behaviors};
pub use config::ExplorerConfig;
pub use context::RobotContext;
pub use error::{ExplorerError, Result};
pub use grid::{CellCoord, GridCell, OccupancyGrid};
pub use hardware::{BumpSide, Hardware, Point2D};
pub use planning::{PlannedPath, WaypointResolver};
