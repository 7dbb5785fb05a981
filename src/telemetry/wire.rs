//! Telemetry framing
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ JSON                     │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! Frames larger than [`MAX_FRAME_BYTES`] are rejected on both ends.

use super::messages::TelemetryMessage;
use crate::error::{ExplorerError, Result};
use std::io::{ErrorKind, Read};

/// Maximum payload size (1 MiB)
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Serialize a message into `buffer` as one complete frame.
///
/// The buffer is cleared first so it can be reused between messages.
pub fn encode_frame(message: &TelemetryMessage, buffer: &mut Vec<u8>) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(ExplorerError::Telemetry(format!(
            "frame of {} bytes exceeds limit",
            payload.len()
        )));
    }
    buffer.clear();
    buffer.reserve(4 + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&payload);
    Ok(())
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<TelemetryMessage>> {
    let mut length = [0u8; 4];
    match reader.read_exact(&mut length) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let length = u32::from_be_bytes(length) as usize;
    if length > MAX_FRAME_BYTES {
        return Err(ExplorerError::Telemetry(format!(
            "incoming frame of {} bytes exceeds limit",
            length
        )));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    Ok(Some(serde_json::from_slice(&payload)?))
}
