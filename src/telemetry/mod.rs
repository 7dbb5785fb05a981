//! Telemetry stream from the robot to remote viewers.
//!
//! The control thread pushes messages through a [`Telemetry`] handle into a
//! bounded lock-free queue and never blocks on the network. A
//! [`TcpPublisher`] thread drains the queue and broadcasts length-prefixed
//! JSON frames; [`TelemetryClient`] reads them on the viewer side.

mod client;
mod messages;
mod publisher;
pub mod wire;

pub use client::TelemetryClient;
pub use messages::{CLOSE_SENTINEL, RobotState, TelemetryMessage};
pub use publisher::TcpPublisher;

use crossbeam_queue::ArrayQueue;
use log::debug;
use std::sync::Arc;

/// Producer handle for the telemetry queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Telemetry {
    queue: Arc<ArrayQueue<TelemetryMessage>>,
}

impl Telemetry {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
        }
    }

    /// Queue a message without blocking.
    ///
    /// On a full queue a log line is dropped, while a state snapshot or the
    /// end-of-stream marker evicts the oldest queued message instead.
    pub fn send(&self, message: TelemetryMessage) {
        if must_deliver(&message) {
            if let Some(evicted) = self.queue.force_push(message) {
                debug!(
                    "Telemetry queue full, evicted oldest {} message",
                    message_kind(&evicted)
                );
            }
        } else if let Err(dropped) = self.queue.push(message) {
            debug!("Telemetry queue full, dropping {} message", message_kind(&dropped));
        }
    }

    pub fn log(&self, text: impl Into<String>) {
        self.send(TelemetryMessage::log(text));
    }

    pub fn state(&self, state: RobotState) {
        self.send(TelemetryMessage::State(state));
    }

    /// Queue the end-of-stream marker
    pub fn close(&self) {
        self.send(TelemetryMessage::close());
    }

    pub fn pop(&self) -> Option<TelemetryMessage> {
        self.queue.pop()
    }

    /// Remove and return everything queued so far.
    pub fn drain(&self) -> Vec<TelemetryMessage> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn queue(&self) -> Arc<ArrayQueue<TelemetryMessage>> {
        Arc::clone(&self.queue)
    }
}

fn must_deliver(message: &TelemetryMessage) -> bool {
    matches!(message, TelemetryMessage::State(_)) || message.is_close()
}

fn message_kind(message: &TelemetryMessage) -> &'static str {
    match message {
        TelemetryMessage::Log { .. } => "log",
        TelemetryMessage::State(_) => "state",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellCoord, OccupancyGrid};

    #[test]
    fn test_full_queue_drops_newest() {
        let telemetry = Telemetry::new(2);
        telemetry.log("a");
        telemetry.log("b");
        telemetry.log("c");
        assert_eq!(telemetry.len(), 2);
        assert_eq!(
            telemetry.drain(),
            vec![TelemetryMessage::log("a"), TelemetryMessage::log("b")]
        );
        assert!(telemetry.is_empty());
    }

    #[test]
    fn test_full_queue_keeps_close_and_state() {
        let telemetry = Telemetry::new(2);
        telemetry.log("a");
        telemetry.log("b");
        telemetry.close();
        telemetry.log("c");
        assert_eq!(
            telemetry.drain(),
            vec![TelemetryMessage::log("b"), TelemetryMessage::close()]
        );

        let state = RobotState {
            grid: OccupancyGrid::new(1, 1).unwrap().snapshot(),
            current_cell: CellCoord::new(0, 0),
            lap_completed: true,
            elapsed_ms: 10,
            movements: 0,
        };
        telemetry.log("d");
        telemetry.log("e");
        telemetry.state(state.clone());
        assert_eq!(
            telemetry.drain(),
            vec![TelemetryMessage::log("e"), TelemetryMessage::State(state)]
        );
    }

    #[test]
    fn test_clones_share_queue() {
        let telemetry = Telemetry::new(8);
        let other = telemetry.clone();
        other.close();
        assert_eq!(telemetry.pop(), Some(TelemetryMessage::close()));
    }
}
