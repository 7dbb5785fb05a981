//! Configuration loading for the grid explorer
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields the deployed 6x7 arena configuration.

use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExplorerConfig {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub gyro_reset: GyroResetConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Arena grid dimensions
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ArenaConfig {
    /// Number of cells along X (default: 6)
    #[serde(default = "default_width")]
    pub width: usize,

    /// Number of cells along Y (default: 7)
    #[serde(default = "default_height")]
    pub height: usize,

    /// Edge length of one cell in centimeters (default: 25.0)
    #[serde(default = "default_cell_size")]
    pub cell_size_cm: f32,
}

/// Drive train and heading control settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MotionConfig {
    /// Cruise linear speed in cm/s (default: 15.0)
    #[serde(default = "default_linear_speed")]
    pub linear_speed: f32,

    /// Cruise angular speed in deg/s (default: 90.0)
    #[serde(default = "default_angular_speed")]
    pub angular_speed: f32,

    /// Accepted difference between requested and measured rotation (default: 2.0)
    #[serde(default = "default_heading_tolerance")]
    pub heading_tolerance_deg: f32,

    /// Rotation attempts per convergence call (default: 33)
    #[serde(default = "default_max_rotation_attempts")]
    pub max_rotation_attempts: u32,

    /// Shortfall subtracted from each cell length while walking a planned path (default: 1.0)
    #[serde(default = "default_path_clearance")]
    pub path_clearance_cm: f32,
}

/// Ultrasonic neighbour scanning
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Readings at or below this distance mark the cell occupied (default: 0.135)
    #[serde(default = "default_occupied_distance")]
    pub occupied_distance_m: f32,

    /// Pause between aiming the turret and reading (default: 200)
    #[serde(default = "default_scan_settle_ms")]
    pub settle_ms: u64,

    /// Pause after each scanned cell (default: 500)
    #[serde(default = "default_scan_dwell_ms")]
    pub dwell_ms: u64,
}

/// Collision recovery
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CollisionConfig {
    /// Target clearance to the obstacle after recovery (default: 12.0)
    #[serde(default = "default_half_cell")]
    pub half_cell_cm: f32,

    /// Smallest back-off when odometry shows no progress (default: 1.0)
    #[serde(default = "default_min_backoff")]
    pub min_backoff_cm: f32,

    /// Longest ultrasonic reading trusted for re-centring (default: 25.0)
    #[serde(default = "default_trusted_range")]
    pub trusted_range_cm: f32,
}

/// Gyro drift correction against walls and blocks
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GyroResetConfig {
    /// Distance backed off after the calibration contact (default: 3.5)
    #[serde(default = "default_back_distance")]
    pub back_distance_cm: f32,

    /// Readings at or above this distance invalidate a correction (default: 0.3)
    #[serde(default = "default_max_valid_distance")]
    pub max_valid_distance_m: f32,

    /// Corrections per invocation across both passes (default: 2)
    #[serde(default = "default_max_corrections")]
    pub max_corrections: usize,

    /// Linear speed divisor during correction (default: 1.5)
    #[serde(default = "default_linear_divisor")]
    pub linear_speed_divisor: f32,

    /// Angular speed divisor during correction (default: 1.25)
    #[serde(default = "default_angular_divisor")]
    pub angular_speed_divisor: f32,

    /// Pause before the ultrasonic reading (default: 200)
    #[serde(default = "default_reset_settle_ms")]
    pub settle_ms: u64,
}

/// Telemetry stream settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// TCP port (default: 1234)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outgoing message queue capacity (default: 1024)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Hold the robot until a viewer connects (default: false)
    #[serde(default)]
    pub wait_for_client: bool,
}

/// Status monitor thread
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Refresh interval (default: 1000)
    #[serde(default = "default_monitor_interval")]
    pub interval_ms: u64,

    /// How long an announcement replaces the status display (default: 2000)
    #[serde(default = "default_announcement_ms")]
    pub announcement_ms: u64,
}

/// Simulated robot and arena
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Noise seed, 0 for entropy (default: 0)
    #[serde(default)]
    pub seed: u64,

    /// Arena rows, top row first; '#' marks a block, '.' a free cell.
    /// Empty means an open arena of the configured size.
    #[serde(default = "default_layout")]
    pub layout: Vec<String>,

    /// Distance from the robot centre to the bumper (default: 9.0)
    #[serde(default = "default_front_offset")]
    pub front_offset_cm: f32,

    /// Distance from the robot centre to the ultrasonic transducer, which sits
    /// behind the bumper (default: 8.0)
    #[serde(default = "default_sensor_offset")]
    pub sensor_offset_cm: f32,

    /// Half width of the bumper (default: 4.0)
    #[serde(default = "default_bumper_half_width")]
    pub bumper_half_width_cm: f32,

    /// Distance at which the bumper switch closes (default: 0.5)
    #[serde(default = "default_bump_margin")]
    pub bump_margin_cm: f32,

    /// Largest tilt a flat push against a face straightens out (default: 15.0)
    #[serde(default = "default_square_max")]
    pub square_max_deg: f32,

    /// Ultrasonic range limit (default: 2.55)
    #[serde(default = "default_max_range")]
    pub max_range_m: f32,

    /// Turret rotation speed in deg/s (default: 360.0)
    #[serde(default = "default_scanner_speed")]
    pub scanner_speed: f32,

    /// Physics step (default: 10)
    #[serde(default = "default_time_step_ms")]
    pub time_step_ms: u64,

    /// A stalled motion command gives up after this long (default: 500)
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    /// Sleep for each simulated step (default: false)
    #[serde(default)]
    pub realtime: bool,

    #[serde(default)]
    pub noise: NoiseConfig,
}

/// Sensor and actuator noise of the simulated robot
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NoiseConfig {
    /// Ultrasonic reading noise (default: 0.002)
    #[serde(default = "default_ultrasonic_stddev")]
    pub ultrasonic_stddev_m: f32,

    /// Gyro reading noise (default: 0.2)
    #[serde(default = "default_gyro_stddev")]
    pub gyro_stddev_deg: f32,

    /// Gyro drift accumulated per degree turned (default: 0.01)
    #[serde(default = "default_gyro_drift")]
    pub gyro_drift_per_deg: f32,

    /// Relative wheel slip on rotations (default: 0.03)
    #[serde(default = "default_rotation_slip")]
    pub rotation_slip: f32,

    /// Relative wheel slip on straight travel (default: 0.01)
    #[serde(default = "default_travel_slip")]
    pub travel_slip: f32,
}

/// Logging settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_width() -> usize {
    6
}
fn default_height() -> usize {
    7
}
fn default_cell_size() -> f32 {
    25.0
}
fn default_linear_speed() -> f32 {
    15.0
}
fn default_angular_speed() -> f32 {
    90.0
}
fn default_heading_tolerance() -> f32 {
    2.0
}
fn default_max_rotation_attempts() -> u32 {
    33
}
fn default_path_clearance() -> f32 {
    1.0
}
fn default_occupied_distance() -> f32 {
    0.135
}
fn default_scan_settle_ms() -> u64 {
    200
}
fn default_scan_dwell_ms() -> u64 {
    500
}
fn default_half_cell() -> f32 {
    12.0
}
fn default_min_backoff() -> f32 {
    1.0
}
fn default_trusted_range() -> f32 {
    25.0
}
fn default_back_distance() -> f32 {
    3.5
}
fn default_max_valid_distance() -> f32 {
    0.3
}
fn default_max_corrections() -> usize {
    2
}
fn default_linear_divisor() -> f32 {
    1.5
}
fn default_angular_divisor() -> f32 {
    1.25
}
fn default_reset_settle_ms() -> u64 {
    200
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    1234
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_monitor_interval() -> u64 {
    1000
}
fn default_announcement_ms() -> u64 {
    2000
}
fn default_layout() -> Vec<String> {
    [
        "......", //
        "..#...", //
        "......", //
        "....#.", //
        ".#....", //
        "......", //
        "......", //
    ]
    .iter()
    .map(|row| row.to_string())
    .collect()
}
fn default_front_offset() -> f32 {
    9.0
}
fn default_sensor_offset() -> f32 {
    8.0
}
fn default_bumper_half_width() -> f32 {
    4.0
}
fn default_bump_margin() -> f32 {
    0.5
}
fn default_square_max() -> f32 {
    15.0
}
fn default_max_range() -> f32 {
    2.55
}
fn default_scanner_speed() -> f32 {
    360.0
}
fn default_time_step_ms() -> u64 {
    10
}
fn default_stall_timeout_ms() -> u64 {
    500
}
fn default_ultrasonic_stddev() -> f32 {
    0.002
}
fn default_gyro_stddev() -> f32 {
    0.2
}
fn default_gyro_drift() -> f32 {
    0.01
}
fn default_rotation_slip() -> f32 {
    0.03
}
fn default_travel_slip() -> f32 {
    0.01
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            cell_size_cm: default_cell_size(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            linear_speed: default_linear_speed(),
            angular_speed: default_angular_speed(),
            heading_tolerance_deg: default_heading_tolerance(),
            max_rotation_attempts: default_max_rotation_attempts(),
            path_clearance_cm: default_path_clearance(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            occupied_distance_m: default_occupied_distance(),
            settle_ms: default_scan_settle_ms(),
            dwell_ms: default_scan_dwell_ms(),
        }
    }
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            half_cell_cm: default_half_cell(),
            min_backoff_cm: default_min_backoff(),
            trusted_range_cm: default_trusted_range(),
        }
    }
}

impl Default for GyroResetConfig {
    fn default() -> Self {
        Self {
            back_distance_cm: default_back_distance(),
            max_valid_distance_m: default_max_valid_distance(),
            max_corrections: default_max_corrections(),
            linear_speed_divisor: default_linear_divisor(),
            angular_speed_divisor: default_angular_divisor(),
            settle_ms: default_reset_settle_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            queue_capacity: default_queue_capacity(),
            wait_for_client: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_monitor_interval(),
            announcement_ms: default_announcement_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            layout: default_layout(),
            front_offset_cm: default_front_offset(),
            sensor_offset_cm: default_sensor_offset(),
            bumper_half_width_cm: default_bumper_half_width(),
            bump_margin_cm: default_bump_margin(),
            square_max_deg: default_square_max(),
            max_range_m: default_max_range(),
            scanner_speed: default_scanner_speed(),
            time_step_ms: default_time_step_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            realtime: false,
            noise: NoiseConfig::default(),
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            ultrasonic_stddev_m: default_ultrasonic_stddev(),
            gyro_stddev_deg: default_gyro_stddev(),
            gyro_drift_per_deg: default_gyro_drift(),
            rotation_slip: default_rotation_slip(),
            travel_slip: default_travel_slip(),
        }
    }
}

impl NoiseConfig {
    /// A noise-free configuration for deterministic runs
    pub fn disabled() -> Self {
        Self {
            ultrasonic_stddev_m: 0.0,
            gyro_stddev_deg: 0.0,
            gyro_drift_per_deg: 0.0,
            rotation_slip: 0.0,
            travel_slip: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ExplorerConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ExplorerError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ExplorerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ExplorerError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.arena.width == 0 || self.arena.height == 0 {
            return Err(ExplorerError::Config(
                "arena width and height must be at least 1".to_string(),
            ));
        }
        if self.arena.cell_size_cm <= self.motion.path_clearance_cm {
            return Err(ExplorerError::Config(
                "cell_size_cm must exceed path_clearance_cm".to_string(),
            ));
        }
        if self.motion.max_rotation_attempts == 0 {
            return Err(ExplorerError::Config(
                "max_rotation_attempts must be at least 1".to_string(),
            ));
        }
        if self.motion.linear_speed <= 0.0 || self.motion.angular_speed <= 0.0 {
            return Err(ExplorerError::Config(
                "motion speeds must be positive".to_string(),
            ));
        }
        if self.gyro_reset.linear_speed_divisor <= 0.0
            || self.gyro_reset.angular_speed_divisor <= 0.0
        {
            return Err(ExplorerError::Config(
                "gyro_reset speed divisors must be positive".to_string(),
            ));
        }
        if self.simulation.time_step_ms == 0 {
            return Err(ExplorerError::Config(
                "simulation time_step_ms must be at least 1".to_string(),
            ));
        }

        let layout = &self.simulation.layout;
        if !layout.is_empty() {
            if layout.len() != self.arena.height {
                return Err(ExplorerError::Config(format!(
                    "simulation layout has {} rows, arena height is {}",
                    layout.len(),
                    self.arena.height
                )));
            }
            if let Some(row) = layout
                .iter()
                .find(|row| row.chars().count() != self.arena.width)
            {
                return Err(ExplorerError::Config(format!(
                    "simulation layout row {:?} does not match arena width {}",
                    row, self.arena.width
                )));
            }
        }
        Ok(())
    }

    /// Telemetry listen address as `host:port`
    pub fn telemetry_address(&self) -> String {
        format!("{}:{}", self.telemetry.bind, self.telemetry.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ExplorerConfig::from_toml("").unwrap();
        assert_eq!(config.arena.width, 6);
        assert_eq!(config.arena.height, 7);
        assert_eq!(config.motion.max_rotation_attempts, 33);
        assert_eq!(config.gyro_reset.max_corrections, 2);
        assert_eq!(config.telemetry.port, 1234);
        assert_eq!(config.simulation.layout.len(), 7);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_str = r#"
[motion]
heading_tolerance_deg = 1.0

[telemetry]
port = 4321
"#;
        let config = ExplorerConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.motion.heading_tolerance_deg, 1.0);
        assert_eq!(config.motion.linear_speed, 15.0);
        assert_eq!(config.telemetry.port, 4321);
        assert_eq!(config.telemetry.bind, "0.0.0.0");
        assert_eq!(config.telemetry_address(), "0.0.0.0:4321");
    }

    #[test]
    fn test_layout_must_match_arena() {
        let toml_str = r#"
[arena]
width = 3
height = 2

[simulation]
layout = ["...", ".."]
"#;
        let result = ExplorerConfig::from_toml(toml_str);
        assert!(matches!(result, Err(ExplorerError::Config(_))));
    }

    #[test]
    fn test_zero_rotation_attempts_rejected() {
        let toml_str = r#"
[motion]
max_rotation_attempts = 0
"#;
        assert!(ExplorerConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = ExplorerConfig::from_toml("[arena\nwidth = ");
        assert!(matches!(result, Err(ExplorerError::Config(_))));
    }

    #[test]
    fn test_load_from_file_and_serialize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[arena]\nwidth = 3\nheight = 3\n\n[simulation]\nlayout = []").unwrap();

        let config = ExplorerConfig::load(file.path()).unwrap();
        assert_eq!(config.arena.width, 3);
        assert!(config.simulation.layout.is_empty());

        let text = config.to_toml().unwrap();
        let reparsed = ExplorerConfig::from_toml(&text).unwrap();
        assert_eq!(reparsed.arena.height, 3);
    }

    #[test]
    fn test_missing_file() {
        let result = ExplorerConfig::load("/nonexistent/explorer.toml");
        assert!(matches!(result, Err(ExplorerError::Config(_))));
    }
}
