//! The wire-and-memory representation of a market quote.
//!
//! A [`QuoteTick`] is the single message type that flows through the system,
//! on both transports: it is copied byte-for-byte into shared-memory ring
//! slots, and serialised to one-line JSON for the TCP stream.
//!
//! # Memory Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       16    instrument  (fixed-width bytes, NUL-terminated)
//! 16      8     bid         (f64)
//! 24      8     ask         (f64)
//! 32      8     timestamp_ns (i64)
//! 40      24    padding     (always zero)
//! ------
//! Total:  64 bytes, aligned to 64 bytes
//! ```
//!
//! The 64/64 size-and-alignment pin is load-bearing: a slot write in the ring
//! is a single aligned copy of one cache line, and the cursor padding
//! arithmetic in `basalt-icc` assumes slots never straddle lines. Publisher
//! and consumer binaries of one deployment must agree on this layout; it is
//! not versioned.

use serde::{Deserialize, Serialize};

/// Width of the inline instrument field, including the terminating NUL.
pub const INSTRUMENT_CAP: usize = 16;

/// Parse/serialise failures for the JSON form of a quote.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed quote json")]
    Json(#[from] sonic_rs::Error),
}

/// A single market quote: instrument, best bid/ask, and the publisher's
/// send timestamp in nanoseconds since the Unix epoch.
///
/// Fixed 64-byte `repr(C)` layout, 64-byte aligned. The instrument symbol is
/// stored inline; inputs longer than [`INSTRUMENT_CAP`]` - 1` bytes are
/// truncated (at a character boundary) and the field is always
/// NUL-terminated. The padding tail is zero in every constructible value, so
/// a record written to shared memory carries no nondeterministic bytes.
#[repr(C, align(64))]
#[derive(Clone, Copy, Debug)]
pub struct QuoteTick {
    instrument: [u8; INSTRUMENT_CAP],
    pub bid: f64,
    pub ask: f64,
    pub timestamp_ns: i64,
    _pad: [u8; 24],
}

const _: () = assert!(core::mem::size_of::<QuoteTick>() == 64);
const _: () = assert!(core::mem::align_of::<QuoteTick>() == 64);

/// Borrowed encode-side DTO; field names define the JSON schema.
#[derive(Serialize)]
struct QuoteJsonRef<'a> {
    instrument: &'a str,
    bid: f64,
    ask: f64,
    timestamp_ns: i64,
}

/// Owned decode-side DTO. All four keys are required; a missing key or a
/// value of the wrong JSON type fails deserialisation.
#[derive(Deserialize)]
struct QuoteJson {
    instrument: String,
    bid: f64,
    ask: f64,
    timestamp_ns: i64,
}

impl QuoteTick {
    pub fn new(instrument: &str, bid: f64, ask: f64, timestamp_ns: i64) -> Self {
        Self {
            instrument: pack_instrument(instrument),
            bid,
            ask,
            timestamp_ns,
            _pad: [0; 24],
        }
    }

    /// The instrument symbol, up to the first NUL.
    pub fn instrument(&self) -> &str {
        let len = self
            .instrument
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(INSTRUMENT_CAP - 1);
        core::str::from_utf8(&self.instrument[..len]).unwrap_or("")
    }

    /// Serialises to a single-line JSON object with exactly the keys
    /// `instrument`, `bid`, `ask`, `timestamp_ns`. Never contains a newline.
    pub fn to_json(&self) -> Result<String, CodecError> {
        let dto = QuoteJsonRef {
            instrument: self.instrument(),
            bid: self.bid,
            ask: self.ask,
            timestamp_ns: self.timestamp_ns,
        };
        Ok(sonic_rs::to_string(&dto)?)
    }

    /// Parses the JSON form produced by [`QuoteTick::to_json`]. Overlong
    /// instrument strings are truncated exactly as in [`QuoteTick::new`].
    pub fn from_json(input: &str) -> Result<Self, CodecError> {
        let dto: QuoteJson = sonic_rs::from_str(input)?;
        Ok(Self::new(&dto.instrument, dto.bid, dto.ask, dto.timestamp_ns))
    }
}

impl Default for QuoteTick {
    /// All 64 bytes zero, padding included.
    fn default() -> Self {
        Self {
            instrument: [0; INSTRUMENT_CAP],
            bid: 0.0,
            ask: 0.0,
            timestamp_ns: 0,
            _pad: [0; 24],
        }
    }
}

impl PartialEq for QuoteTick {
    /// Bit-exact comparison of the four fields; prices compare by their IEEE
    /// bit pattern so a round-tripped record is equal iff no bit changed.
    fn eq(&self, other: &Self) -> bool {
        self.instrument == other.instrument
            && self.bid.to_bits() == other.bid.to_bits()
            && self.ask.to_bits() == other.ask.to_bits()
            && self.timestamp_ns == other.timestamp_ns
    }
}

impl Eq for QuoteTick {}

fn pack_instrument(s: &str) -> [u8; INSTRUMENT_CAP] {
    let mut buf = [0u8; INSTRUMENT_CAP];
    let mut len = s.len().min(INSTRUMENT_CAP - 1);
    while len > 0 && !s.is_char_boundary(len) {
        len -= 1;
    }
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn quote_is_one_cache_line() {
        assert_eq!(size_of::<QuoteTick>(), 64, "QuoteTick layout changed");
        assert_eq!(align_of::<QuoteTick>(), 64, "QuoteTick alignment changed");
    }

    #[test]
    fn default_quote_is_all_zero_bytes() {
        let tick = QuoteTick::default();
        let bytes: [u8; 64] = unsafe { core::mem::transmute(tick) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn constructor_truncates_and_nul_terminates() {
        let tick = QuoteTick::new("VERYLONGINSTRUMENTNAME", 1.0, 2.0, 3);
        assert_eq!(tick.instrument(), "VERYLONGINSTRUM");
        assert_eq!(tick.instrument().len(), INSTRUMENT_CAP - 1);

        let short = QuoteTick::new("AAPL", 1.0, 2.0, 3);
        assert_eq!(short.instrument(), "AAPL");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 2 + 5×3 bytes: byte 15 falls mid-codepoint, so the last € is cut
        // whole rather than leaving a broken sequence.
        let tick = QuoteTick::new("AA€€€€€", 1.0, 2.0, 3);
        assert_eq!(tick.instrument(), "AA€€€€");
    }

    #[test]
    fn json_round_trip_preserves_all_fields() {
        let tick = QuoteTick::new("AAPL", 150.25, 150.27, 1_000_000);
        let json = tick.to_json().unwrap();
        assert!(!json.contains('\n'));
        let back = QuoteTick::from_json(&json).unwrap();
        assert_eq!(back, tick);
        assert_eq!(back.instrument(), "AAPL");
        assert_eq!(back.bid.to_bits(), 150.25f64.to_bits());
        assert_eq!(back.ask.to_bits(), 150.27f64.to_bits());
        assert_eq!(back.timestamp_ns, 1_000_000);
    }

    #[test]
    fn decode_truncates_overlong_instrument() {
        let json = r#"{"instrument":"ABCDEFGHIJKLMNOPQRST","bid":1.0,"ask":1.1,"timestamp_ns":7}"#;
        let tick = QuoteTick::from_json(json).unwrap();
        assert_eq!(tick.instrument(), "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn decode_rejects_malformed_input() {
        for bad in [
            "",
            "{ garbage }",
            "not json at all",
            // missing a key
            r#"{"instrument":"A","bid":1.0,"ask":1.1}"#,
            // wrong types
            r#"{"instrument":17,"bid":1.0,"ask":1.1,"timestamp_ns":7}"#,
            r#"{"instrument":"A","bid":"1.0","ask":1.1,"timestamp_ns":7}"#,
            r#"{"instrument":"A","bid":1.0,"ask":1.1,"timestamp_ns":7.5}"#,
        ] {
            assert!(QuoteTick::from_json(bad).is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn negative_and_integral_numbers_decode() {
        let json = r#"{"instrument":"SYM","bid":2,"ask":2.5,"timestamp_ns":-5}"#;
        let tick = QuoteTick::from_json(json).unwrap();
        assert_eq!(tick.bid, 2.0);
        assert_eq!(tick.timestamp_ns, -5);
    }
}
