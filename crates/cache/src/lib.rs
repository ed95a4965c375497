//! Tile pyramid storage.
//!
//! Tiles are generated into a [`MemoryTileDatabase`] and flushed in batches to
//! a SQLite-backed [`TileDatabase`]. Readers consult both: the stage holds
//! what has been generated but not yet flushed.

mod check;
mod db;
pub mod error;
mod memory;
mod models;
pub mod pyramid;
mod repo;
mod writer;

pub use crate::check::CheckReport;
pub use crate::db::{Access, Database, StoreSize};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::memory::MemoryTileDatabase;
pub use crate::models::{FileEntry, FileId, Freshness, NewFileEntry, TileEntry, TileFormat, TileKey, TilePos};
pub use crate::repo::{MergeReport, TileDatabase};
pub use crate::writer::{StagingWriter, TileWriter, TileWriterHandle};
