//! # Host Bridge Traits
//!
//! Capability traits the resolution engine needs from its host.
//!
//! ## Overview
//!
//! The engine never talks to the network, the wall clock or a log pipeline
//! directly. Each of those is a trait defined here and implemented by a host
//! crate (`bridge-desktop` for native builds), which keeps the engine testable
//! with deterministic doubles.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async single-attempt HTTP with timeouts and TLS
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into the closest variant so callers can tell
//! transient transport failures (timeouts, refused connections, certificate
//! problems) from permanent ones via [`BridgeError::is_transient`].
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across async tasks behind an `Arc`.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
//!
//! async fn fetch(client: &dyn HttpClient) -> bridge_traits::error::Result<String> {
//!     let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/v1/Games")
//!         .header("Accept", "application/json");
//!     client.execute(request).await?.text()
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
