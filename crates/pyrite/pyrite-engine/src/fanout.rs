//! TCP fan-out: one I/O worker owns the listener and the subscriber table.
//!
//! The tick loop hands fully framed lines (JSON + `\n`) to the worker over a
//! channel and never touches a socket, so a slow or blocked subscriber can
//! never stall quote production. The worker alternates between accepting
//! pending connections on a non-blocking listener and writing queued lines
//! to every subscriber; a write failure or timeout drops that subscriber and
//! the stream goes on without it.
//!
//! Subscribers joining mid-stream receive only lines queued after their
//! accept; there is no replay.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the worker sleeps in the channel before re-polling the listener.
const ACCEPT_POLL: Duration = Duration::from_millis(1);

/// A subscriber that cannot take bytes for this long is disconnected.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("failed to listen on '{addr}'")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure listener")]
    Listener(#[source] std::io::Error),

    #[error("failed to spawn fan-out worker")]
    Spawn(#[source] std::io::Error),
}

struct Subscriber {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Handle to the fan-out worker. Dropping it closes the line channel, which
/// shuts the worker down (closing all subscriber sockets) and joins it.
pub struct QuoteFanout {
    line_tx: Option<Sender<Arc<[u8]>>>,
    local_addr: SocketAddr,
    subscribers: Arc<AtomicUsize>,
    disconnects: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl QuoteFanout {
    /// Binds the listening endpoint and starts the I/O worker.
    pub fn bind(addr: &str) -> Result<Self, FanoutError> {
        let listener = TcpListener::bind(addr).map_err(|source| FanoutError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(FanoutError::Listener)?;
        let local_addr = listener.local_addr().map_err(FanoutError::Listener)?;

        let (line_tx, line_rx) = unbounded::<Arc<[u8]>>();
        let subscribers = Arc::new(AtomicUsize::new(0));
        let disconnects = Arc::new(AtomicU64::new(0));

        let worker_subs = Arc::clone(&subscribers);
        let worker_disconnects = Arc::clone(&disconnects);
        let worker = std::thread::Builder::new()
            .name("quote-fanout".into())
            .spawn(move || worker_loop(listener, line_rx, worker_subs, worker_disconnects))
            .map_err(FanoutError::Spawn)?;

        Ok(Self {
            line_tx: Some(line_tx),
            local_addr,
            subscribers,
            disconnects,
            worker: Some(worker),
        })
    }

    /// Queues one framed line for every current subscriber. Never blocks.
    pub fn publish(&self, line: Arc<[u8]>) {
        if let Some(tx) = &self.line_tx {
            let _ = tx.send(line);
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }
}

impl Drop for QuoteFanout {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel; the worker drains
        // what is queued and exits.
        self.line_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    listener: TcpListener,
    line_rx: Receiver<Arc<[u8]>>,
    subscribers: Arc<AtomicUsize>,
    disconnects: Arc<AtomicU64>,
) {
    let mut table: Vec<Subscriber> = Vec::new();

    loop {
        accept_pending(&listener, &mut table);
        subscribers.store(table.len(), Ordering::Relaxed);

        match line_rx.recv_timeout(ACCEPT_POLL) {
            Ok(line) => {
                broadcast(&mut table, &line, &disconnects);
                subscribers.store(table.len(), Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    subscribers.store(0, Ordering::Relaxed);
    debug!("fan-out worker stopped");
}

fn accept_pending(listener: &TcpListener, table: &mut Vec<Subscriber>) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = configure(&stream) {
                    warn!(%peer, error = %e, "rejecting subscriber");
                    continue;
                }
                info!(%peer, "subscriber connected");
                table.push(Subscriber { stream, peer });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "accept failed");
                return;
            }
        }
    }
}

fn configure(stream: &TcpStream) -> std::io::Result<()> {
    // The accepted socket inherits the listener's non-blocking flag on some
    // platforms; writes must block (up to the timeout) instead.
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok(())
}

fn broadcast(table: &mut Vec<Subscriber>, line: &[u8], disconnects: &AtomicU64) {
    table.retain_mut(|sub| match sub.stream.write_all(line) {
        Ok(()) => true,
        Err(e) => {
            info!(peer = %sub.peer, error = %e, "subscriber dropped");
            disconnects.fetch_add(1, Ordering::Relaxed);
            false
        }
    });
}
