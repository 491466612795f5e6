//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace layer, timeout)
//!     → service handler (gateway / geolocator / distance)
//!     → client.rs (child span, traceparent + deadline forwarded)
//!     → downstream service
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;

pub use client::{CallScope, DownstreamClient, Endpoint, UpstreamReply};
pub use request::{first_param, request_id, MakeRequestUuid, X_REQUEST_ID};
pub use response::Hop;
pub use server::HttpServer;
