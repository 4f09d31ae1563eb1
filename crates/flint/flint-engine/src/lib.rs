//! `flint-engine`: the TCP consumer.
//!
//! Connects to the publisher, reads the byte stream, and recovers quotes
//! through the newline framing in `basalt-wire`. The decoder retains partial
//! trailing bytes across reads, so the engine is indifferent to how the
//! kernel chunks the stream.
//!
//! Per the framing contract: empty lines are skipped, malformed lines are
//! counted and skipped without dropping the connection. Latency is measured
//! against this process's cached clock; across hosts the number is only as
//! meaningful as the hosts' clock synchronisation.

use basalt_clock::{ClockError, CoarseClock, LatencyStats};
use basalt_events::QuoteTick;
use basalt_wire::{decode_line, LineDecoder};
use flint_config::FlintConfig;
use std::io::Read;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read buffer size for the subscriber socket.
const READ_BUF: usize = 4096;

/// Emit a latency status line every this many messages.
const STATUS_EVERY: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum FlintError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("failed to connect to '{addr}'")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct FlintEngine {
    stream: TcpStream,
    clock: CoarseClock,
    decoder: LineDecoder,
    running: Arc<AtomicBool>,
    stats: LatencyStats,
    messages: u64,
    parse_errors: u64,
}

impl FlintEngine {
    pub fn new(config: &FlintConfig) -> Result<Self, FlintError> {
        let clock = CoarseClock::start()?;
        let stream = TcpStream::connect(&config.connect_addr).map_err(|source| {
            FlintError::Connect {
                addr: config.connect_addr.clone(),
                source,
            }
        })?;
        info!(addr = %config.connect_addr, "flint subscribed");

        Ok(Self {
            stream,
            clock,
            decoder: LineDecoder::new(),
            running: Arc::new(AtomicBool::new(true)),
            stats: LatencyStats::new(),
            messages: 0,
            parse_errors: 0,
        })
    }

    /// Reads until the peer closes the connection, a socket error occurs, or
    /// the running flag clears.
    pub fn run(&mut self) {
        let mut buf = [0u8; READ_BUF];
        while self.running.load(Ordering::Relaxed) {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    info!("publisher closed the stream");
                    break;
                }
                Ok(n) => {
                    self.process_bytes(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "subscriber socket failed");
                    break;
                }
            }
        }
        info!(
            messages = self.messages,
            parse_errors = self.parse_errors,
            min_latency_us = self.stats.min_us(),
            mean_latency_us = self.stats.mean_us(),
            max_latency_us = self.stats.max_us(),
            "flint stopped"
        );
    }

    /// Feeds one chunk of the byte stream through the framing layer.
    /// Returns the quotes completed by this chunk.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Vec<QuoteTick> {
        self.decoder.extend(bytes);
        let mut out = Vec::new();
        while let Some(line) = self.decoder.next_line() {
            if line.is_empty() {
                continue;
            }
            match decode_line(&line) {
                Ok(tick) => {
                    self.on_quote(&tick);
                    out.push(tick);
                }
                Err(e) => {
                    self.parse_errors += 1;
                    warn!(error = %e, line_len = line.len(), "skipping malformed line");
                }
            }
        }
        out
    }

    fn on_quote(&mut self, tick: &QuoteTick) {
        self.messages += 1;
        let latency_ns = self.clock.now() - tick.timestamp_ns;
        self.stats.record(latency_ns);

        debug!(
            msg = self.messages,
            instrument = tick.instrument(),
            bid = tick.bid,
            ask = tick.ask,
            latency_us = latency_ns as f64 / 1_000.0,
            "quote"
        );
        if self.messages % STATUS_EVERY == 0 {
            info!(
                messages = self.messages,
                parse_errors = self.parse_errors,
                min_latency_us = self.stats.min_us(),
                mean_latency_us = self.stats.mean_us(),
                max_latency_us = self.stats.max_us(),
                "flint status"
            );
        }
    }

    /// Clearing the returned flag stops `run` after the current read.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// A loopback listener so the engine has something to connect to; the
    /// tests below drive `process_bytes` directly.
    fn engine() -> (FlintEngine, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = FlintConfig {
            connect_addr: listener.local_addr().unwrap().to_string(),
            log_level: "info".into(),
        };
        let engine = FlintEngine::new(&config).unwrap();
        (engine, listener)
    }

    #[test]
    fn connect_failure_is_a_startup_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = FlintConfig {
            connect_addr: addr,
            log_level: "info".into(),
        };
        assert!(matches!(
            FlintEngine::new(&config),
            Err(FlintError::Connect { .. })
        ));
    }

    #[test]
    fn tolerates_empty_and_malformed_lines_mid_stream() {
        let (mut engine, _listener) = engine();

        let stream = concat!(
            "{\"instrument\":\"A\",\"bid\":1.0,\"ask\":1.1,\"timestamp_ns\":10}\n",
            "\n",
            "{ garbage }\n",
            "{\"instrument\":\"B\",\"bid\":2.0,\"ask\":2.1,\"timestamp_ns\":20}\n",
        );

        let quotes = engine.process_bytes(stream.as_bytes());
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].instrument(), "A");
        assert_eq!(quotes[0].timestamp_ns, 10);
        assert_eq!(quotes[1].instrument(), "B");
        assert_eq!(quotes[1].timestamp_ns, 20);
        assert_eq!(engine.messages(), 2);
        assert_eq!(engine.parse_errors(), 1);
    }

    #[test]
    fn one_byte_chunks_recover_the_full_sequence() {
        let (mut engine, _listener) = engine();

        let sent: Vec<QuoteTick> = (0..50)
            .map(|i| QuoteTick::new("SYM", i as f64, i as f64 + 0.01, i))
            .collect();
        let mut wire = Vec::new();
        for tick in &sent {
            wire.extend_from_slice(&basalt_wire::encode_line(tick).unwrap());
        }

        let mut received = Vec::new();
        for &byte in &wire {
            received.extend(engine.process_bytes(&[byte]));
        }
        assert_eq!(received, sent);
        assert_eq!(engine.parse_errors(), 0);
    }

    #[test]
    fn partial_line_is_held_until_completed() {
        let (mut engine, _listener) = engine();
        let full = "{\"instrument\":\"C\",\"bid\":3.0,\"ask\":3.1,\"timestamp_ns\":30}\n";
        let (head, tail) = full.split_at(20);

        assert!(engine.process_bytes(head.as_bytes()).is_empty());
        let quotes = engine.process_bytes(tail.as_bytes());
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].instrument(), "C");
    }
}
