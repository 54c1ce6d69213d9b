//! Shared state and messaging between the scan worker and its owner
//!
//! The worker never shares mutable scan state; it only emits messages over a
//! one-way channel and bumps counters.

pub mod messages;
pub mod state;

pub use messages::{ExtractionReport, ScanMessage, SessionCommand};
pub use state::SessionStats;
