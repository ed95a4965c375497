//! Write-back stage for freshly generated tiles.

use crate::TileDatabase;
use crate::error::Result;
use crate::models::{FileId, TileEntry, TileKey, TilePos};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::instrument;

struct Staged {
    seq: u64,
    tile: TileEntry,
}

#[derive(Default)]
struct Stage {
    tiles: HashMap<TileKey, Staged>,
    next_seq: u64,
}

/// In-memory tiles waiting to be flushed to a [`TileDatabase`].
///
/// Generators stage tiles here from worker threads while viewers read them
/// back, long before they are durable. A failed flush leaves the stage as it
/// was, so flushing again later persists the same tiles without
/// regenerating them.
#[derive(Default)]
pub struct MemoryTileDatabase {
    stage: Mutex<Stage>,
    // Only one flush may be writing at a time.
    flushing: tokio::sync::Mutex<()>,
}

impl MemoryTileDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_tile(&self, file_id: FileId, scale: u32, pos: TilePos) -> bool {
        self.stage.lock().tiles.contains_key(&TileKey { file_id, scale, pos })
    }

    pub fn get_tile(&self, file_id: FileId, scale: u32, pos: TilePos) -> Option<TileEntry> {
        self.stage.lock().tiles.get(&TileKey { file_id, scale, pos }).map(|staged| staged.tile.clone())
    }

    pub fn get_tiles(&self, file_id: FileId) -> Vec<TileEntry> {
        let mut tiles: Vec<TileEntry> = self
            .stage
            .lock()
            .tiles
            .values()
            .filter(|staged| staged.tile.file_id == file_id)
            .map(|staged| staged.tile.clone())
            .collect();
        tiles.sort_by_key(|tile| (std::cmp::Reverse(tile.scale), tile.pos.y, tile.pos.x));
        tiles
    }

    /// Finest and coarsest staged scale, or `None` if nothing is staged for
    /// the file.
    pub fn get_min_max_scale(&self, file_id: FileId) -> Option<(u32, u32)> {
        self.stage
            .lock()
            .tiles
            .keys()
            .filter(|key| key.file_id == file_id)
            .fold(None, |range, key| match range {
                None => Some((key.scale, key.scale)),
                Some((min, max)) => Some((min.min(key.scale), max.max(key.scale))),
            })
    }

    /// Stage a tile, replacing any staged tile with the same key.
    pub fn store_tile(&self, tile: TileEntry) {
        let mut stage = self.stage.lock();
        let seq = stage.next_seq;
        stage.next_seq += 1;
        stage.tiles.insert(tile.key(), Staged { seq, tile });
    }

    pub fn store_tiles(&self, tiles: impl IntoIterator<Item = TileEntry>) {
        let mut stage = self.stage.lock();
        for tile in tiles {
            let seq = stage.next_seq;
            stage.next_seq += 1;
            stage.tiles.insert(tile.key(), Staged { seq, tile });
        }
    }

    /// Drop every staged tile of a file. Durable storage is not touched.
    pub fn delete_tiles(&self, file_id: FileId) -> usize {
        let mut stage = self.stage.lock();
        let before = stage.tiles.len();
        stage.tiles.retain(|key, _| key.file_id != file_id);
        before - stage.tiles.len()
    }

    pub fn len(&self) -> usize {
        self.stage.lock().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stage.lock().tiles.is_empty()
    }

    /// Keep flushes out until the guard drops.
    ///
    /// A flush that has already copied the stage would otherwise write a
    /// file's old tiles back after they were discarded. Hold this while
    /// replacing a file's tiles.
    pub async fn hold_flushes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.flushing.lock().await
    }

    /// Persist everything staged so far in one transaction, then unstage it.
    ///
    /// Tiles staged while the write is in progress stay staged for the next
    /// flush, including ones that replace a tile being written. On error
    /// nothing is unstaged. Returns the number of tiles written.
    #[instrument(level = "debug", skip_all, fields(tiles))]
    pub async fn flush(&self, db: &TileDatabase) -> Result<usize> {
        let _flushing = self.flushing.lock().await;
        let (batch, watermark) = {
            let stage = self.stage.lock();
            let batch: Vec<TileEntry> = stage.tiles.values().map(|staged| staged.tile.clone()).collect();
            (batch, stage.next_seq)
        };
        tracing::Span::current().record("tiles", batch.len());
        if batch.is_empty() {
            return Ok(0);
        }
        db.store_tiles(&batch).await?;
        self.stage.lock().tiles.retain(|_, staged| staged.seq >= watermark);
        Ok(batch.len())
    }
}
