//! # Game Library Module
//!
//! Persistence side of the collection tracker as seen by the metadata
//! resolver: the game record model, the set of fields the resolver can fill,
//! and a repository that finds records missing a field and writes resolved
//! values back.
//!
//! The tracker owns its schema; this crate only reads and updates the
//! `games` table.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{FieldValue, GameRecord, MetadataField, NewGame};
pub use repositories::{GameRepository, SqliteGameRepository};
