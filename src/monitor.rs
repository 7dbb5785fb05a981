//! Periodic status display.
//!
//! The control thread publishes into a [`StatusBoard`]; a [`Monitor`]
//! thread reads it on a timer and logs the current cell, flags and the
//! occupancy grid. Announcements temporarily replace the status display.
//! Reads are best effort and may be one update stale.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::telemetry::RobotState;
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What the monitor shows about the robot.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorStatus {
    pub state: RobotState,
    pub scanning: bool,
}

impl MonitorStatus {
    /// Compact one-line summary, e.g. `C:(1, 2)|S:T|#C:4|LC:F`.
    pub fn summary(&self) -> String {
        format!(
            "C:{}|S:{}|#C:{}|LC:{}",
            self.state.current_cell,
            flag(self.scanning),
            self.state.movements,
            flag(self.state.lap_completed)
        )
    }
}

fn flag(value: bool) -> char {
    if value { 'T' } else { 'F' }
}

#[derive(Debug, Default)]
struct BoardState {
    status: Option<MonitorStatus>,
    announcement: Option<(String, Instant)>,
}

/// Shared slot between the control thread and the monitor.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BoardState>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, status: MonitorStatus) {
        self.inner.write().status = Some(status);
    }

    /// Show a message instead of the status for the announcement period.
    pub fn announce(&self, text: impl Into<String>) {
        let text = text.into();
        info!("> {}", text);
        self.inner.write().announcement = Some((text, Instant::now()));
    }

    pub fn status(&self) -> Option<MonitorStatus> {
        self.inner.read().status.clone()
    }

    /// The current announcement if it is younger than `hold`.
    pub fn announcement(&self, hold: Duration) -> Option<String> {
        self.inner
            .read()
            .announcement
            .as_ref()
            .filter(|(_, at)| at.elapsed() < hold)
            .map(|(text, _)| text.clone())
    }
}

/// Lines the monitor logs for one refresh.
pub fn render(board: &StatusBoard, hold: Duration) -> Vec<String> {
    if let Some(text) = board.announcement(hold) {
        return vec![format!("> {}", text)];
    }
    match board.status() {
        Some(status) => {
            let mut lines = vec![status.summary()];
            lines.extend(status.state.grid.probability_rows());
            lines
        }
        None => vec!["waiting for robot".to_string()],
    }
}

/// Timer thread that logs the board contents.
pub struct Monitor {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn spawn(board: StatusBoard, config: &MonitorConfig) -> Result<Self> {
        let interval = Duration::from_millis(config.interval_ms.max(1));
        let hold = Duration::from_millis(config.announcement_ms);
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let thread = thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || {
                let mut last_refresh = Instant::now();
                while !thread_shutdown.load(Ordering::Relaxed) {
                    if last_refresh.elapsed() >= interval {
                        for line in render(&board, hold) {
                            info!(target: "monitor", "{}", line);
                        }
                        last_refresh = Instant::now();
                    }
                    thread::sleep(Duration::from_millis(20).min(interval));
                }
            })?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
