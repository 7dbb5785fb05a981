//! Viewer-side connection to a robot's telemetry stream.

use super::messages::TelemetryMessage;
use super::wire::read_frame;
use crate::error::{ExplorerError, Result};
use log::info;
use std::io::BufReader;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Blocking reader of telemetry frames.
pub struct TelemetryClient {
    reader: BufReader<TcpStream>,
    peer: SocketAddr,
}

impl TelemetryClient {
    /// Connect to `address` (host:port), trying each resolved address in turn.
    pub fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let mut last_error = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    info!("Connected to telemetry at {}", addr);
                    return Ok(Self {
                        reader: BufReader::new(stream),
                        peer: addr,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => ExplorerError::Telemetry(format!("{} did not resolve", address)),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Set a read timeout for [`recv`](Self::recv).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Next message, or None once the robot closed the connection.
    pub fn recv(&mut self) -> Result<Option<TelemetryMessage>> {
        read_frame(&mut self.reader)
    }
}
