//! Timeout enforcement.
//!
//! # Responsibilities
//! - Give every inbound request a time budget
//! - Bound each downstream call by what is left of that budget
//! - Forward the remaining budget so the next hop can stop early
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities through reqwest's per-request timeout
//! - The budget only ever shrinks across hops; a caller cannot extend it
//! - Timed-out requests return 504 Gateway Timeout

use axum::http::{HeaderMap, HeaderValue};
use std::time::Duration;
use tokio::time::Instant;

/// Header carrying the remaining request budget in milliseconds.
pub const DEADLINE_HEADER: &str = "x-request-timeout-ms";

/// Point in time after which work for a request is pointless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Deadline of an inbound request: `default_budget`, shortened by the
    /// caller's `x-request-timeout-ms` when that is smaller.
    pub fn from_headers(headers: &HeaderMap, default_budget: Duration) -> Self {
        let inbound = headers
            .get(DEADLINE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis);

        match inbound {
            Some(budget) if budget < default_budget => Self::after(budget),
            _ => Self::after(default_budget),
        }
    }

    /// Time left; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Budget for one downstream call: the remaining time, capped at `limit`.
    pub fn call_budget(&self, limit: Duration) -> Duration {
        self.remaining().min(limit)
    }

    /// Header value forwarding the remaining budget.
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from(self.remaining().as_millis() as u64)
    }

    /// Write the remaining budget into outgoing request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        headers.insert(DEADLINE_HEADER, self.header_value());
    }
}
