//! Shared exploration state mutated by the active behavior.
//!
//! The context owns the occupancy grid and the hardware handle. Cells are
//! referenced by coordinate only. Behaviors read it through
//! `wants_control(&RobotContext)` and mutate it from `act(&mut RobotContext)`,
//! so only the control thread ever writes to it.

use crate::config::ArenaConfig;
use crate::error::Result;
use crate::grid::{CellCoord, OccupancyGrid};
use crate::hardware::{BumpSide, Hardware, Point2D};
use crate::monitor::{MonitorStatus, StatusBoard};
use crate::telemetry::{RobotState, Telemetry};
use crate::utils::{shortest_rotation, wrap_heading};
use log::{debug, info};
use std::time::Instant;

/// Exploration state plus the robot's sensors and actuators.
pub struct RobotContext {
    hardware: Box<dyn Hardware>,
    grid: OccupancyGrid,
    current_cell: CellCoord,
    previous_cell: Option<CellCoord>,
    /// Odometry at the last two cell transitions
    current_location: Point2D,
    previous_location: Point2D,
    scanning: bool,
    needing_gyro_reset: bool,
    lap_completed: bool,
    calibrating: bool,
    cells_moved: u32,
    gyro_offset: f32,
    started_at: Instant,
    telemetry: Telemetry,
    board: StatusBoard,
}

impl RobotContext {
    /// Fresh context at cell (0, 0): visited, observed free once, scanning armed.
    pub fn new(
        mut hardware: Box<dyn Hardware>,
        arena: &ArenaConfig,
        telemetry: Telemetry,
        board: StatusBoard,
    ) -> Result<Self> {
        let mut grid = OccupancyGrid::new(arena.width, arena.height)?;
        let start = CellCoord::new(0, 0);
        let cell = grid.try_cell_mut(start)?;
        cell.set_visited(true);
        cell.unoccupied();

        hardware.reset_gyro()?;
        let location = hardware.odometry();

        let context = Self {
            hardware,
            grid,
            current_cell: start,
            previous_cell: None,
            current_location: location,
            previous_location: location,
            scanning: true,
            needing_gyro_reset: false,
            lap_completed: false,
            calibrating: false,
            cells_moved: 0,
            gyro_offset: 0.0,
            started_at: Instant::now(),
            telemetry,
            board,
        };
        context.refresh_status();
        info!(
            "RobotContext: {}x{} grid, starting at {}",
            arena.width, arena.height, start
        );
        Ok(context)
    }

    pub fn hardware(&self) -> &dyn Hardware {
        self.hardware.as_ref()
    }

    pub fn hardware_mut(&mut self) -> &mut dyn Hardware {
        self.hardware.as_mut()
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut OccupancyGrid {
        &mut self.grid
    }

    pub fn current_cell(&self) -> CellCoord {
        self.current_cell
    }

    pub fn previous_cell(&self) -> Option<CellCoord> {
        self.previous_cell
    }

    /// Odometry recorded when the robot arrived in the current cell
    pub fn current_location(&self) -> Point2D {
        self.current_location
    }

    pub fn previous_location(&self) -> Point2D {
        self.previous_location
    }

    /// Commit a completed move into `cell`.
    ///
    /// Shifts current to previous, marks the cell visited, records the
    /// odometry location and publishes a state snapshot.
    pub fn set_current_cell(&mut self, cell: CellCoord) -> Result<()> {
        self.grid.try_cell_mut(cell)?.set_visited(true);
        self.previous_cell = Some(self.current_cell);
        self.current_cell = cell;
        self.previous_location = self.current_location;
        self.current_location = self.hardware.odometry();
        self.cells_moved += 1;
        debug!(
            "RobotContext: moved to {} (move #{})",
            cell, self.cells_moved
        );
        self.publish_state();
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn set_scanning(&mut self, scanning: bool) {
        self.scanning = scanning;
        self.refresh_status();
    }

    pub fn needs_gyro_reset(&self) -> bool {
        self.needing_gyro_reset
    }

    pub fn set_needing_gyro_reset(&mut self, needing: bool) {
        self.needing_gyro_reset = needing;
    }

    pub fn is_lap_completed(&self) -> bool {
        self.lap_completed
    }

    pub fn set_lap_completed(&mut self, completed: bool) {
        self.lap_completed = completed;
        self.refresh_status();
    }

    /// Whether a deliberate calibration contact is in progress
    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    pub fn set_calibrating(&mut self, calibrating: bool) {
        self.calibrating = calibrating;
    }

    pub fn cells_moved(&self) -> u32 {
        self.cells_moved
    }

    pub fn gyro_offset(&self) -> f32 {
        self.gyro_offset
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn any_bump_pressed(&self) -> bool {
        self.hardware.bump_pressed(BumpSide::Left) || self.hardware.bump_pressed(BumpSide::Right)
    }

    /// Absolute heading in [0, 360): raw gyro plus the calibration offset.
    pub fn angle(&mut self) -> Result<f32> {
        let raw = self.hardware.read_gyro()?;
        Ok(wrap_heading(raw + self.gyro_offset))
    }

    /// Declare the current physical heading to be `map_angle` and zero the gyro.
    pub fn reset_gyro(&mut self, map_angle: f32) -> Result<()> {
        self.gyro_offset = shortest_rotation(map_angle);
        self.hardware.reset_gyro()?;
        debug!("RobotContext: gyro reset to {:.0}", map_angle);
        Ok(())
    }

    pub fn snapshot(&self) -> RobotState {
        RobotState {
            grid: self.grid.snapshot(),
            current_cell: self.current_cell,
            lap_completed: self.lap_completed,
            elapsed_ms: self.elapsed_ms(),
            movements: self.cells_moved,
        }
    }

    /// Push a state snapshot to telemetry and the status board.
    pub fn publish_state(&self) {
        let state = self.snapshot();
        self.board.update(MonitorStatus {
            state: state.clone(),
            scanning: self.scanning,
        });
        self.telemetry.state(state);
    }

    /// Update the status board without a telemetry frame.
    pub fn refresh_status(&self) {
        self.board.update(MonitorStatus {
            state: self.snapshot(),
            scanning: self.scanning,
        });
    }

    /// Log a behavior message locally and on the telemetry log channel.
    pub fn report(&self, source: &str, message: impl AsRef<str>) {
        let line = format!("[{}] {}", source, message.as_ref());
        debug!("{}", line);
        self.telemetry.log(line);
    }

    /// Send the grid as text rows on the log channel.
    pub fn publish_map_rows(&self) {
        let snapshot = self.grid.snapshot();
        self.telemetry.log("**** OCCUPANCY GRID ****");
        for row in snapshot.probability_rows() {
            self.telemetry.log(row);
        }
        self.telemetry.log("**** VISITS GRID ****");
        for row in snapshot.visit_rows() {
            self.telemetry.log(row);
        }
    }

    /// Show a message on the monitor.
    pub fn announce(&self, text: impl Into<String>) {
        self.board.announce(text);
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }
}
