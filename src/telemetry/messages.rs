//! Messages streamed from the robot to remote viewers.

use crate::grid::{CellCoord, GridSnapshot};
use serde::{Deserialize, Serialize};

/// Log line that marks the end of the stream.
pub const CLOSE_SENTINEL: &str = "%CLOSE%";

/// Deep copy of the exploration state at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub grid: GridSnapshot,
    pub current_cell: CellCoord,
    pub lap_completed: bool,
    /// Milliseconds since the robot started
    pub elapsed_ms: u64,
    /// Cell transitions so far
    pub movements: u32,
}

/// One telemetry frame payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryMessage {
    /// Human-readable log line, usually prefixed with `[BehaviorName]`
    Log { text: String },
    /// Full state snapshot
    State(RobotState),
}

impl TelemetryMessage {
    pub fn log(text: impl Into<String>) -> Self {
        Self::Log { text: text.into() }
    }

    /// The end-of-stream marker
    pub fn close() -> Self {
        Self::log(CLOSE_SENTINEL)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Log { text } if text == CLOSE_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OccupancyGrid;

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&TelemetryMessage::log("[Scan] hello")).unwrap();
        assert_eq!(json, r#"{"type":"Log","text":"[Scan] hello"}"#);

        let state = RobotState {
            grid: OccupancyGrid::new(1, 1).unwrap().snapshot(),
            current_cell: CellCoord::new(0, 0),
            lap_completed: true,
            elapsed_ms: 1500,
            movements: 3,
        };
        let value = serde_json::to_value(TelemetryMessage::State(state.clone())).unwrap();
        assert_eq!(value["type"], "State");
        assert_eq!(value["movements"], 3);
        assert_eq!(value["grid"]["width"], 1);

        let back: TelemetryMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, TelemetryMessage::State(state));
    }

    #[test]
    fn test_close_sentinel() {
        assert!(TelemetryMessage::close().is_close());
        assert!(!TelemetryMessage::log("%CLOSE").is_close());
    }
}
