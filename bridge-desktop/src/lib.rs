//! # Desktop Bridge Implementations
//!
//! Native implementations of the bridge traits for desktop and server hosts.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls, a fixed user agent, bounded
//!   redirects and certificate verification enabled
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HttpClientConfig, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new(HttpClientConfig::default())?);
//! ```

mod http;

pub use http::{HttpClientConfig, ReqwestHttpClient};
