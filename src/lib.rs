//! Umbrella crate for the game metadata workspace.
//!
//! Re-exports the resolver crates so a host can depend on one package. The
//! `desktop` feature (on by default) adds the reqwest-backed HTTP bridge.

pub use core_library as library;
pub use core_metadata as metadata;
pub use core_runtime as runtime;

#[cfg(feature = "desktop")]
pub use bridge_desktop as desktop;

pub use core_metadata::{lookup, BatchResolver, FallbackOrchestrator, LookupResponse, Query};
