use crate::error::Result;
use crate::models::{FileEntry, Freshness, NewFileEntry, TileEntry};
use crate::{MemoryTileDatabase, TileDatabase};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Where a generator sends what it produces.
///
/// Called from job worker threads, never from inside an async runtime.
pub trait TileWriter: Send + Sync {
    /// Record the image before any of its tiles. A stale entry comes back
    /// with its old tiles already discarded.
    fn register(&self, entry: NewFileEntry) -> Result<FileEntry>;

    fn write(&self, tile: TileEntry) -> Result<()>;
}

pub type TileWriterHandle = Arc<dyn TileWriter>;

/// Registers entries in a [`TileDatabase`] right away and stages tiles in a
/// [`MemoryTileDatabase`] until the owner flushes it.
pub struct StagingWriter {
    db: TileDatabase,
    stage: Arc<MemoryTileDatabase>,
    runtime: Handle,
}

impl StagingWriter {
    /// `runtime` drives the database calls made by [`register`](TileWriter::register).
    pub fn new(db: TileDatabase, stage: Arc<MemoryTileDatabase>, runtime: Handle) -> Self {
        Self { db, stage, runtime }
    }

    pub fn stage(&self) -> &Arc<MemoryTileDatabase> {
        &self.stage
    }
}

impl TileWriter for StagingWriter {
    fn register(&self, entry: NewFileEntry) -> Result<FileEntry> {
        self.runtime.block_on(async {
            // A refresh drops durable and staged tiles together, with no
            // flush in between.
            let _hold = self.stage.hold_flushes().await;
            let (entry, freshness) = self.db.store_file_entry(&entry).await?;
            if freshness == Freshness::Refreshed {
                self.stage.delete_tiles(entry.id);
            }
            Ok(entry)
        })
    }

    fn write(&self, tile: TileEntry) -> Result<()> {
        self.stage.store_tile(tile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::models::{TileFormat, TilePos};
    use time::UtcDateTime;

    #[test]
    fn test_staging_writer() {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        let db = TileDatabase::from(&runtime.block_on(Database::connect_in_memory()).unwrap());
        let stage = Arc::new(MemoryTileDatabase::new());
        let writer = StagingWriter::new(db.clone(), Arc::clone(&stage), runtime.handle().clone());
        let new = |mtime| NewFileEntry {
            url: "file:///a.jpg".to_string(),
            size: 1,
            mtime: Some(UtcDateTime::from_unix_timestamp(mtime).unwrap()),
            width: 300,
            height: 200,
            format: TileFormat::Jpeg,
        };

        let entry = writer.register(new(1)).unwrap();
        writer.write(TileEntry::new(entry.id, 0, TilePos::new(0, 0), TileFormat::Jpeg, vec![1])).unwrap();
        assert_eq!(stage.len(), 1);
        // Tiles are staged, not yet durable.
        assert!(runtime.block_on(db.get_tiles(entry.id)).unwrap().is_empty());

        // A changed mtime refreshes the entry and discards its staged tiles.
        let refreshed = writer.register(new(2)).unwrap();
        assert_eq!(refreshed.id, entry.id);
        assert!(stage.is_empty());
    }

    #[test]
    fn test_refresh_waits_for_running_flush() {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
        let db = TileDatabase::from(&runtime.block_on(Database::connect_in_memory()).unwrap());
        let stage = Arc::new(MemoryTileDatabase::new());
        let writer = StagingWriter::new(db.clone(), Arc::clone(&stage), runtime.handle().clone());
        let new = |mtime| NewFileEntry {
            url: "file:///a.jpg".to_string(),
            size: 1,
            mtime: Some(UtcDateTime::from_unix_timestamp(mtime).unwrap()),
            width: 300,
            height: 200,
            format: TileFormat::Jpeg,
        };
        let entry = writer.register(new(1)).unwrap();
        writer.write(TileEntry::new(entry.id, 0, TilePos::new(0, 0), TileFormat::Jpeg, vec![1])).unwrap();

        // Stand in for a flush in progress; the refresh has to wait for it.
        let hold = runtime.block_on(stage.hold_flushes());
        let refresh = std::thread::scope(|scope| {
            let refresh = scope.spawn(|| writer.register(new(2)));
            std::thread::sleep(std::time::Duration::from_millis(20));
            assert!(!refresh.is_finished());
            assert_eq!(stage.len(), 1);
            drop(hold);
            refresh.join().unwrap()
        });
        assert_eq!(refresh.unwrap().id, entry.id);
        assert!(stage.is_empty());
        assert_eq!(runtime.block_on(stage.flush(&db)).unwrap(), 0);
        assert!(runtime.block_on(db.get_tiles(entry.id)).unwrap().is_empty());
    }
}
