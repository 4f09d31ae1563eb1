//! `basalt-events`: the shared message vocabulary of the quote pipeline.
//!
//! Currently a single event type, [`QuoteTick`], consumed by every other
//! crate in the workspace. Kept separate so the publisher and both consumers
//! agree on one definition of the record layout and its JSON form.

mod quote;

pub use quote::{CodecError, QuoteTick, INSTRUMENT_CAP};
