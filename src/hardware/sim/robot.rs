//! Simulated exploration robot.
//!
//! Differential drive with a front bumper, an ultrasonic sensor on a
//! turret and a drifting gyro. Time is virtual: every [`Hardware::is_moving`]
//! or [`Hardware::is_scanner_moving`] poll advances the physics by one step,
//! and [`Hardware::pause`] advances it by the requested duration.
//!
//! Ground truth and the robot's own estimates diverge through wheel slip and
//! gyro drift. A forward push that stalls against a flat face pivots the
//! chassis square to it, the physical effect the gyro reset behavior relies on.

use super::arena::Arena;
use super::noise::SimNoise;
use crate::config::{ArenaConfig, MotionConfig, SimulationConfig};
use crate::error::{ExplorerError, Result};
use crate::grid::CellCoord;
use crate::hardware::{BumpSide, Hardware, Point2D};
use crate::utils::heading_vector;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Commands closer than this to completion are finished.
const MOTION_EPSILON: f32 = 1e-4;

/// Tilts below this count as already square.
const SQUARE_EPSILON_DEG: f32 = 1e-3;

/// Settling resolution when squaring up against a face.
const SQUARE_STEP_CM: f32 = 0.05;

/// Ground-truth pose. Heading in degrees clockwise from +Y, unwrapped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

impl Pose {
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug)]
enum MotionKind {
    Travel,
    Rotate,
}

#[derive(Clone, Copy, Debug)]
struct ActiveCommand {
    kind: MotionKind,
    /// Remaining commanded magnitude (cm or degrees)
    remaining: f32,
    sign: f32,
    /// Actual / commanded ratio for this command
    slip: f32,
    /// Gyro error per commanded degree for this command
    drift_rate: f32,
    stalled_for: Duration,
}

struct SimState {
    arena: Arena,
    config: SimulationConfig,
    noise: SimNoise,
    pose: Pose,
    odometry: Point2D,
    odometry_heading: f32,
    gyro_reference: f32,
    gyro_drift: f32,
    linear_speed: f32,
    angular_speed: f32,
    command: Option<ActiveCommand>,
    scanner_angle: f32,
    scanner_target: f32,
    clock: Duration,
    closed: bool,
}

impl SimState {
    fn time_step(&self) -> Duration {
        Duration::from_millis(self.config.time_step_ms)
    }

    fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.config.stall_timeout_ms)
    }

    /// Points on the bumper (left, centre, right) `reach` cm ahead of the centre.
    fn bumper_points(&self, pose: Pose, reach: f32) -> [Point2D; 3] {
        let (fx, fy) = heading_vector(pose.heading);
        // Left of the direction of travel is heading - 90
        let (lx, ly) = heading_vector(pose.heading - 90.0);
        let w = self.config.bumper_half_width_cm;
        let cx = pose.x + fx * reach;
        let cy = pose.y + fy * reach;
        [
            Point2D::new(cx + lx * w, cy + ly * w),
            Point2D::new(cx, cy),
            Point2D::new(cx - lx * w, cy - ly * w),
        ]
    }

    fn blocked(&self, pose: Pose, sign: f32) -> bool {
        if sign > 0.0 {
            self.bumper_points(pose, self.config.front_offset_cm)
                .iter()
                .any(|p| self.arena.is_obstacle(*p))
        } else {
            self.arena.is_obstacle(pose.position())
        }
    }

    fn bump(&self, side: BumpSide) -> bool {
        let reach = self.config.front_offset_cm + self.config.bump_margin_cm;
        let [left, centre, right] = self.bumper_points(self.pose, reach);
        let edge = match side {
            BumpSide::Left => left,
            BumpSide::Right => right,
        };
        self.arena.is_obstacle(edge) || self.arena.is_obstacle(centre)
    }

    /// Pivot a stalled forward push flat against the face ahead.
    ///
    /// The chassis turns to the nearest axis heading and settles against the
    /// face. Corner contacts, where the squared bumper does not touch along its
    /// whole width, and tilts beyond `square_max_deg` leave the pose alone.
    fn square_up(&mut self) -> bool {
        let axis = (self.pose.heading / 90.0).round() * 90.0;
        let tilt = self.pose.heading - axis;
        if tilt.abs() < SQUARE_EPSILON_DEG || tilt.abs() > self.config.square_max_deg {
            return false;
        }

        let (dx, dy) = heading_vector(axis);
        let mut squared = Pose {
            heading: axis,
            ..self.pose
        };
        let mut settled = 0.0;
        while settled < self.config.bumper_half_width_cm {
            let next = Pose {
                x: squared.x + dx * SQUARE_STEP_CM,
                y: squared.y + dy * SQUARE_STEP_CM,
                heading: axis,
            };
            if self.blocked(next, 1.0) {
                break;
            }
            squared = next;
            settled += SQUARE_STEP_CM;
        }

        let reach = self.config.front_offset_cm + self.config.bump_margin_cm;
        let flush = self
            .bumper_points(squared, reach)
            .iter()
            .all(|p| self.arena.is_obstacle(*p));
        if flush {
            self.pose = squared;
        }
        flush
    }

    fn start(&mut self, kind: MotionKind, amount: f32) -> Result<()> {
        if self.closed {
            return Err(ExplorerError::Hardware("simulated robot is closed".to_string()));
        }
        let (slip, drift_rate) = match kind {
            MotionKind::Travel => (self.noise.travel_slip(), 0.0),
            MotionKind::Rotate => (self.noise.rotation_slip(), self.noise.drift_rate()),
        };
        self.command = (amount.abs() > MOTION_EPSILON).then_some(ActiveCommand {
            kind,
            remaining: amount.abs(),
            sign: amount.signum(),
            slip,
            drift_rate,
            stalled_for: Duration::ZERO,
        });
        Ok(())
    }

    fn step(&mut self) {
        let dt = self.time_step();
        let secs = dt.as_secs_f32();
        self.clock += dt;

        let scanner_step = self.config.scanner_speed * secs;
        let delta = self.scanner_target - self.scanner_angle;
        if delta.abs() <= scanner_step {
            self.scanner_angle = self.scanner_target;
        } else {
            self.scanner_angle += scanner_step * delta.signum();
        }

        let Some(mut command) = self.command else {
            return;
        };

        match command.kind {
            MotionKind::Travel => {
                let commanded = command.remaining.min(self.linear_speed * secs);
                let actual = commanded * command.slip * command.sign;
                let (dx, dy) = heading_vector(self.pose.heading);
                let next = Pose {
                    x: self.pose.x + dx * actual,
                    y: self.pose.y + dy * actual,
                    heading: self.pose.heading,
                };
                if self.blocked(next, command.sign) {
                    if command.sign > 0.0 && self.square_up() {
                        debug!("SimRobot: squared up against a face at {:.0}", self.pose.heading);
                    }
                    command.stalled_for += dt;
                    if command.stalled_for >= self.stall_timeout() {
                        debug!("SimRobot: travel stalled, giving up");
                        self.command = None;
                    } else {
                        self.command = Some(command);
                    }
                    return;
                }
                self.pose = next;
                let (ox, oy) = heading_vector(self.odometry_heading);
                self.odometry.x += ox * commanded * command.sign;
                self.odometry.y += oy * commanded * command.sign;
                command.remaining -= commanded;
            }
            MotionKind::Rotate => {
                let commanded = command.remaining.min(self.angular_speed * secs);
                self.pose.heading += commanded * command.slip * command.sign;
                self.gyro_drift += commanded * command.drift_rate;
                self.odometry_heading += commanded * command.sign;
                command.remaining -= commanded;
            }
        }

        self.command = (command.remaining > MOTION_EPSILON).then_some(command);
    }
}

/// Simulated robot driver.
pub struct SimRobot {
    state: Arc<Mutex<SimState>>,
    escape: Arc<AtomicBool>,
    realtime: bool,
}

/// Read-only view of the simulation for tests and diagnostics.
#[derive(Clone)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
    escape: Arc<AtomicBool>,
}

impl SimRobot {
    /// Robot at the centre of cell (0, 0), facing +Y.
    pub fn new(arena: Arena, config: &SimulationConfig, motion: &MotionConfig) -> Self {
        let start = arena.cell_center(CellCoord::new(0, 0));
        let state = SimState {
            noise: SimNoise::new(config.seed, config.noise.clone()),
            config: config.clone(),
            pose: Pose {
                x: start.x,
                y: start.y,
                heading: 0.0,
            },
            odometry: start,
            odometry_heading: 0.0,
            gyro_reference: 0.0,
            gyro_drift: 0.0,
            linear_speed: motion.linear_speed,
            angular_speed: motion.angular_speed,
            command: None,
            scanner_angle: 0.0,
            scanner_target: 0.0,
            clock: Duration::ZERO,
            closed: false,
            arena,
        };
        info!(
            "SimRobot: {}x{} arena, {} blocks, seed {}",
            state.arena.width(),
            state.arena.height(),
            state.arena.blocks().count(),
            config.seed
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            escape: Arc::new(AtomicBool::new(false)),
            realtime: config.realtime,
        }
    }

    /// Build the arena from configuration and place the robot in it.
    pub fn from_config(
        arena: &ArenaConfig,
        simulation: &SimulationConfig,
        motion: &MotionConfig,
    ) -> Result<Self> {
        let layout = Arena::from_config(arena, simulation)?;
        Ok(Self::new(layout, simulation, motion))
    }

    /// Share an external escape flag (for example a Ctrl-C handler).
    pub fn with_escape(mut self, escape: Arc<AtomicBool>) -> Self {
        self.escape = escape;
        self
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: Arc::clone(&self.state),
            escape: Arc::clone(&self.escape),
        }
    }

    fn advance(&self) {
        let dt = {
            let mut state = self.state.lock();
            state.step();
            state.time_step()
        };
        if self.realtime {
            thread::sleep(dt);
        }
    }
}

impl SimProbe {
    pub fn true_pose(&self) -> Pose {
        self.state.lock().pose
    }

    /// Arena cell under the robot centre
    pub fn true_cell(&self) -> Option<CellCoord> {
        let state = self.state.lock();
        state.arena.cell_at(state.pose.position())
    }

    /// Virtual time elapsed
    pub fn clock(&self) -> Duration {
        self.state.lock().clock
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn arena(&self) -> Arena {
        self.state.lock().arena.clone()
    }

    /// Simulate the operator pressing the escape button
    pub fn press_escape(&self) {
        self.escape.store(true, Ordering::SeqCst);
    }

    /// Add gyro error the robot cannot observe
    pub fn drift_gyro(&self, degrees: f32) {
        self.state.lock().gyro_drift += degrees;
    }
}

impl Hardware for SimRobot {
    fn bump_pressed(&self, side: BumpSide) -> bool {
        self.state.lock().bump(side)
    }

    fn escape_pressed(&self) -> bool {
        self.escape.load(Ordering::SeqCst)
    }

    fn read_ultrasonic(&mut self) -> Result<f32> {
        let mut state = self.state.lock();
        let direction = state.pose.heading + state.scanner_angle;
        let (dx, dy) = heading_vector(direction);
        let offset = state.config.sensor_offset_cm;
        let origin = Point2D::new(state.pose.x + dx * offset, state.pose.y + dy * offset);
        let max_cm = state.config.max_range_m * 100.0;
        let distance_m = state.arena.ray_distance(origin, direction, max_cm) / 100.0;
        let reading = state.noise.ultrasonic(distance_m);
        Ok(reading.clamp(0.0, state.config.max_range_m))
    }

    fn read_gyro(&mut self) -> Result<f32> {
        let mut state = self.state.lock();
        let raw = state.pose.heading - state.gyro_reference + state.gyro_drift;
        Ok(state.noise.gyro(raw))
    }

    fn reset_gyro(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.gyro_reference = state.pose.heading;
        state.gyro_drift = 0.0;
        Ok(())
    }

    fn rotate(&mut self, degrees: f32, immediate_return: bool) -> Result<()> {
        self.state.lock().start(MotionKind::Rotate, degrees)?;
        if !immediate_return {
            while self.is_moving() {}
        }
        Ok(())
    }

    fn travel(&mut self, distance_cm: f32, immediate_return: bool) -> Result<()> {
        self.state.lock().start(MotionKind::Travel, distance_cm)?;
        if !immediate_return {
            while self.is_moving() {}
        }
        Ok(())
    }

    fn is_moving(&mut self) -> bool {
        self.advance();
        self.state.lock().command.is_some()
    }

    fn stop(&mut self) -> Result<()> {
        self.state.lock().command = None;
        Ok(())
    }

    fn set_linear_speed(&mut self, speed: f32) -> Result<()> {
        if speed <= 0.0 {
            return Err(ExplorerError::Hardware(format!("invalid linear speed {}", speed)));
        }
        self.state.lock().linear_speed = speed;
        Ok(())
    }

    fn set_angular_speed(&mut self, speed: f32) -> Result<()> {
        if speed <= 0.0 {
            return Err(ExplorerError::Hardware(format!("invalid angular speed {}", speed)));
        }
        self.state.lock().angular_speed = speed;
        Ok(())
    }

    fn aim_scanner(&mut self, degrees: f32) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ExplorerError::Hardware("simulated robot is closed".to_string()));
        }
        state.scanner_target = degrees;
        Ok(())
    }

    fn is_scanner_moving(&mut self) -> bool {
        self.advance();
        let state = self.state.lock();
        state.scanner_angle != state.scanner_target
    }

    fn odometry(&self) -> Point2D {
        self.state.lock().odometry
    }

    fn pause(&mut self, duration: Duration) {
        let dt = self.state.lock().time_step();
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.advance();
            elapsed += dt;
        }
    }

    fn wait_for_acknowledge(&mut self) -> Result<()> {
        info!("SimRobot: acknowledged");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.command = None;
        state.closed = true;
        info!("SimRobot: closed after {:.1}s simulated", state.clock.as_secs_f32());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseConfig;
    use approx::assert_relative_eq;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            seed: 1,
            noise: NoiseConfig::disabled(),
            ..SimulationConfig::default()
        }
    }

    fn robot(layout: &[&str]) -> SimRobot {
        let arena = Arena::from_layout(layout, 25.0).unwrap();
        SimRobot::new(arena, &quiet_config(), &MotionConfig::default())
    }

    #[test]
    fn test_travel_one_cell() {
        let mut robot = robot(&["...", "...", "..."]);
        let probe = robot.probe();
        robot.travel(25.0, false).unwrap();

        let pose = probe.true_pose();
        assert_relative_eq!(pose.x, 12.5, epsilon = 1e-3);
        assert_relative_eq!(pose.y, 37.5, epsilon = 1e-3);
        assert_eq!(probe.true_cell(), Some(CellCoord::new(0, 1)));
        assert_relative_eq!(robot.odometry().y, 37.5, epsilon = 1e-3);
        // 25 cm at 15 cm/s
        assert!(probe.clock() >= Duration::from_millis(1600));
    }

    #[test]
    fn test_rotation_and_gyro() {
        let mut robot = robot(&["...", "...", "..."]);
        robot.rotate(90.0, false).unwrap();
        assert_relative_eq!(robot.read_gyro().unwrap(), 90.0, epsilon = 1e-3);
        robot.reset_gyro().unwrap();
        assert_relative_eq!(robot.read_gyro().unwrap(), 0.0, epsilon = 1e-3);
        robot.rotate(-180.0, false).unwrap();
        assert_relative_eq!(robot.read_gyro().unwrap(), -180.0, epsilon = 1e-3);
    }

    #[test]
    fn test_ultrasonic_sees_block_and_wall() {
        let mut robot = robot(&["...", "...", ".#."]);
        // Block to the right of (0, 0): face at x = 25, sensor at x = 20.5
        robot.aim_scanner(90.0).unwrap();
        while robot.is_scanner_moving() {}
        assert_relative_eq!(robot.read_ultrasonic().unwrap(), 0.045, epsilon = 0.002);

        // Open column above: wall at y = 75, sensor at y = 20.5
        robot.aim_scanner(0.0).unwrap();
        while robot.is_scanner_moving() {}
        assert_relative_eq!(robot.read_ultrasonic().unwrap(), 0.545, epsilon = 0.002);
    }

    #[test]
    fn test_travel_into_block_stalls_and_bumps() {
        let mut robot = robot(&["...", "...", ".#."]);
        let probe = robot.probe();
        robot.rotate(90.0, false).unwrap();
        robot.travel(25.0, true).unwrap();

        let mut polls = 0;
        while !robot.bump_pressed(BumpSide::Left) {
            assert!(robot.is_moving(), "command ended before contact");
            polls += 1;
            assert!(polls < 1000);
        }
        // Stalled against the face at x = 25 with the bumper 9 cm ahead
        assert!(probe.true_pose().x <= 16.0 + 0.01);
        assert!(robot.bump_pressed(BumpSide::Right));

        // Gives up after the stall timeout
        let mut polls = 0;
        while robot.is_moving() {
            polls += 1;
            assert!(polls < 100);
        }

        robot.travel(-3.0, false).unwrap();
        assert!(!robot.bump_pressed(BumpSide::Left));
    }

    #[test]
    fn test_tilted_push_squares_against_wall() {
        let mut robot = robot(&["...", "...", "..."]);
        let probe = robot.probe();
        robot.rotate(6.0, false).unwrap();
        robot.travel(70.0, false).unwrap();

        let pose = probe.true_pose();
        assert_relative_eq!(pose.heading, 0.0, epsilon = 1e-3);
        // Bumper flush with the top wall at y = 75
        assert_relative_eq!(pose.y, 66.0, epsilon = 0.2);
        // The gyro felt the chassis turn
        assert_relative_eq!(robot.read_gyro().unwrap(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_steep_push_is_not_squared() {
        let mut robot = robot(&["...", "...", "..."]);
        let probe = robot.probe();
        robot.rotate(30.0, false).unwrap();
        robot.travel(80.0, false).unwrap();
        assert_relative_eq!(probe.true_pose().heading, 30.0, epsilon = 1e-3);
    }

    #[test]
    fn test_stop_and_close() {
        let mut robot = robot(&["...", "...", "..."]);
        let probe = robot.probe();
        robot.travel(25.0, true).unwrap();
        assert!(robot.is_moving());
        robot.stop().unwrap();
        assert!(!robot.is_moving());

        robot.close().unwrap();
        assert!(probe.is_closed());
        assert!(robot.travel(10.0, true).is_err());
    }

    #[test]
    fn test_escape_flag_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let robot = robot(&["."]).with_escape(Arc::clone(&flag));
        assert!(!robot.escape_pressed());
        flag.store(true, Ordering::SeqCst);
        assert!(robot.escape_pressed());
    }

    #[test]
    fn test_pause_advances_clock() {
        let mut robot = robot(&["."]);
        let probe = robot.probe();
        robot.pause(Duration::from_millis(200));
        assert_eq!(probe.clock(), Duration::from_millis(200));
    }
}
