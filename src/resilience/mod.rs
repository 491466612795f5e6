//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → timeouts.rs (Deadline from config, shortened by x-request-timeout-ms)
//! Downstream call:
//!     → bounded by Deadline::call_budget, remaining budget forwarded
//!     → on expiry: UpstreamTimeout (504)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a downstream failure is surfaced on the first attempt

pub mod timeouts;

pub use timeouts::{Deadline, DEADLINE_HEADER};
