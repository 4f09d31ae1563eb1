//! Two-process integration test for the SPSC ring over shared memory.
//!
//! The test re-invokes its own executable with a role environment variable:
//!
//! ```text
//! [publisher] --[create segment]--[write r0..r1999, paced]--[done]
//!                    |                |   |   |
//!                    v                v   v   v
//!               [shm segment]    (concurrent reads)
//!                    |                ^   ^   ^
//!                    v                |   |   |
//! [consumer]  ------[attach]-----[read r0..r1999]-----------[done]
//! ```
//!
//! Both processes run at the same time; the consumer asserts it observes all
//! records in publication order with bit-identical fields, exercising the
//! acquire/release cursor protocol under real cross-process concurrency.

use basalt_events::QuoteTick;
use basalt_icc::{SpscRing, RING_BYTES};
use basalt_shm::ShmSegment;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

macro_rules! log {
    ($($arg:tt)*) => {{
        let _ = writeln!(std::io::stderr(), $($arg)*);
        let _ = std::io::stderr().flush();
    }};
}

const ENV_ROLE: &str = "BASALT_E2E_ROLE";
const ENV_PATH: &str = "BASALT_E2E_PATH";
const ROLE_PUBLISHER: &str = "publisher";
const ROLE_CONSUMER: &str = "consumer";

const RECORD_COUNT: u64 = 2_000;
const PUBLISH_PACE: Duration = Duration::from_micros(50);

fn record(i: u64) -> QuoteTick {
    QuoteTick::new("SYM", i as f64, i as f64 + 0.01, i as i64)
}

fn segment_path() -> String {
    std::env::temp_dir()
        .join(format!("basalt_e2e_ring_{}", std::process::id()))
        .display()
        .to_string()
}

fn run_publisher(path: &str) {
    log!("[PUBLISHER] creating segment at {path} ({RING_BYTES} bytes)");
    let mut segment = ShmSegment::create(path, RING_BYTES).expect("publisher: create segment");
    let ring = unsafe { SpscRing::init_at(segment.as_mut_ptr(), segment.len()) }
        .expect("publisher: ring init");

    assert_eq!(ring.available_for_read(), 0, "fresh ring must be empty");

    let start = Instant::now();
    for i in 0..RECORD_COUNT {
        let r = record(i);
        // The ring never blocks; the publisher spins out a full ring here
        // because this test must not drop records.
        while !ring.try_write(&r) {
            std::hint::spin_loop();
        }
        std::thread::sleep(PUBLISH_PACE);
    }
    log!(
        "[PUBLISHER] wrote {RECORD_COUNT} records in {:?}",
        start.elapsed()
    );

    // Give the consumer time to drain before the segment is unlinked.
    let deadline = Instant::now() + Duration::from_secs(10);
    while ring.available_for_read() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(ring.available_for_read(), 0, "consumer did not drain");
    log!("[PUBLISHER] done");
}

fn run_consumer(path: &str) {
    let open_deadline = Instant::now() + Duration::from_secs(5);
    let mut segment = loop {
        match ShmSegment::attach(path, RING_BYTES) {
            Ok(seg) => break seg,
            Err(_) if Instant::now() < open_deadline => {
                std::thread::sleep(Duration::from_millis(1))
            }
            Err(e) => panic!("[CONSUMER] attach failed: {e}"),
        }
    };
    let ring =
        unsafe { SpscRing::from_base(segment.as_mut_ptr(), segment.len()) }.expect("ring view");
    log!("[CONSUMER] attached");

    let mut out = QuoteTick::default();
    let mut expected = 0u64;
    let read_deadline = Instant::now() + Duration::from_secs(30);

    while expected < RECORD_COUNT {
        if ring.try_read(&mut out) {
            assert_eq!(
                out,
                record(expected),
                "record {expected} out of order or torn"
            );
            expected += 1;
        } else {
            assert!(
                Instant::now() < read_deadline,
                "[CONSUMER] timed out at record {expected}"
            );
            std::hint::spin_loop();
        }
    }

    log!("[CONSUMER] verified {RECORD_COUNT} records in order");
}

#[test]
fn e2e_two_process_spsc_ring() {
    if let Ok(role) = env::var(ENV_ROLE) {
        let path = env::var(ENV_PATH).expect("role set without segment path");
        match role.as_str() {
            ROLE_PUBLISHER => run_publisher(&path),
            ROLE_CONSUMER => run_consumer(&path),
            other => panic!("unknown role: {other}"),
        }
        return;
    }

    let path = segment_path();
    let exe = env::current_exe().expect("current executable path");

    log!("[ORCHESTRATOR] segment: {path}");

    let mut publisher = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_spsc_ring")
        .env(ENV_ROLE, ROLE_PUBLISHER)
        .env(ENV_PATH, &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("spawn publisher");

    std::thread::sleep(Duration::from_millis(5));

    let mut consumer = Command::new(&exe)
        .arg("--exact")
        .arg("e2e_two_process_spsc_ring")
        .env(ENV_ROLE, ROLE_CONSUMER)
        .env(ENV_PATH, &path)
        .stderr(Stdio::inherit())
        .spawn()
        .expect("spawn consumer");

    let publisher_status = publisher.wait().expect("wait publisher");
    let consumer_status = consumer.wait().expect("wait consumer");

    let _ = std::fs::remove_file(&path);

    assert!(publisher_status.success(), "publisher failed");
    assert!(consumer_status.success(), "consumer failed");
}
