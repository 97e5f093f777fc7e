//! Download scheduling primitives.
//!
//! - [`InFlightCoalescer`] merges concurrent requests for the same key into
//!   one underlying operation.
//! - [`ConcurrencyGate`] bounds how many operations run at once.
//!
//! ```text
//! fetch(k) ─┐
//! fetch(k) ─┼──► InFlightCoalescer ──► ConcurrencyGate ──► downloader
//! fetch(k) ─┘        (one task)          (limit slots)
//! ```

mod coalesce;
mod concurrency;

pub use coalesce::{CoalesceError, CoalescerStats, InFlightCoalescer};
pub use concurrency::{ConcurrencyGate, GatePermit};
