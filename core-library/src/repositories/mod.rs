//! # Repository Pattern Implementation
//!
//! Traits define the data access interface; SQLite implementations use sqlx.
//! The metadata resolver depends on the trait only, so tests can swap in a
//! mock.

pub mod game;

pub use game::{GameRepository, SqliteGameRepository};
