//! TCP telemetry publisher.
//!
//! A dedicated thread owns the listener, accepts viewers and broadcasts
//! every queued message to all of them. Disconnected viewers are dropped
//! silently; the robot never waits on the network.

use super::Telemetry;
use super::messages::TelemetryMessage;
use super::wire::encode_frame;
use crate::error::Result;
use crossbeam_queue::ArrayQueue;
use log::{debug, error, info, warn};
use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Greeting sent to each viewer as it connects.
const GREETING: &str = "===[ CONNECTED ]===";

/// Messages broadcast per loop iteration before checking for new viewers.
const BATCH_SIZE: usize = 50;

/// Broadcasts telemetry frames to every connected viewer.
pub struct TcpPublisher {
    local_addr: SocketAddr,
    clients: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    publisher_thread: Option<JoinHandle<()>>,
}

impl TcpPublisher {
    /// Bind the listener and start the publisher thread.
    ///
    /// Binding happens on the caller's thread so address errors surface here
    /// and port 0 resolves to a concrete [`local_addr`](Self::local_addr).
    pub fn bind(address: &str, telemetry: &Telemetry) -> Result<Self> {
        let listener = TcpListener::bind(address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let clients = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let queue = telemetry.queue();

        let thread_clients = Arc::clone(&clients);
        let thread_shutdown = Arc::clone(&shutdown);
        let publisher_thread = thread::Builder::new()
            .name("telemetry-publisher".to_string())
            .spawn(move || {
                if let Err(e) =
                    Self::publisher_loop(listener, queue, thread_clients, thread_shutdown)
                {
                    error!("Telemetry publisher error: {}", e);
                }
            })?;

        info!("Telemetry publisher listening on {}", local_addr);

        Ok(Self {
            local_addr,
            clients,
            shutdown,
            publisher_thread: Some(publisher_thread),
        })
    }

    fn publisher_loop(
        listener: TcpListener,
        queue: Arc<ArrayQueue<TelemetryMessage>>,
        client_count: Arc<AtomicUsize>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut clients: Vec<TcpStream> = Vec::new();
        let mut buffer = Vec::with_capacity(4096);
        let mut published = 0u64;

        loop {
            match listener.accept() {
                Ok((mut stream, addr)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("Failed to set blocking mode for viewer {}: {}", addr, e);
                    } else {
                        encode_frame(&TelemetryMessage::log(GREETING), &mut buffer)?;
                        match stream.write_all(&buffer) {
                            Ok(()) => {
                                info!("Telemetry viewer connected: {}", addr);
                                clients.push(stream);
                            }
                            Err(e) => debug!("Viewer {} dropped during greeting: {}", addr, e),
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => error!("Error accepting viewer: {}", e),
            }

            for _ in 0..BATCH_SIZE {
                let Some(message) = queue.pop() else {
                    break;
                };
                match encode_frame(&message, &mut buffer) {
                    Ok(()) => {
                        Self::broadcast(&mut clients, &buffer);
                        published += 1;
                    }
                    Err(e) => warn!("Skipping unencodable telemetry message: {}", e),
                }
            }
            client_count.store(clients.len(), Ordering::SeqCst);

            if queue.is_empty() {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }

        info!("Telemetry publisher exiting ({} messages published)", published);
        Ok(())
    }

    fn broadcast(clients: &mut Vec<TcpStream>, frame: &[u8]) {
        clients.retain_mut(|client| match client.write_all(frame) {
            Ok(()) => true,
            Err(e) => {
                if let Ok(addr) = client.peer_addr() {
                    debug!("Viewer {} disconnected: {}", addr, e);
                }
                false
            }
        });
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Viewers connected as of the last publisher iteration
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Block until at least one viewer is connected or the timeout expires.
    pub fn wait_for_client(&self, timeout: Option<Duration>) -> bool {
        let started = Instant::now();
        while self.client_count() == 0 {
            if timeout.is_some_and(|t| started.elapsed() >= t) {
                return false;
            }
            thread::sleep(Duration::from_millis(20));
        }
        true
    }

    /// Flush the queue and stop the publisher thread
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for TcpPublisher {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.publisher_thread.take() {
            let _ = thread.join();
        }
    }
}
