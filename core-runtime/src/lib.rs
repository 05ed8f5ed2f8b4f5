//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the resolver crates:
//! - Logging and tracing setup
//! - Resolver configuration with validation and environment loading
//! - Event bus for resolution and batch progress

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
