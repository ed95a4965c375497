use crate::source::{TileReply, TileSourceHandle};
use mosaic_cache::{FileEntry, TileEntry, TilePos};
use mosaic_jobs::{JobHandle, Mailbox};
use std::collections::{HashMap, HashSet};

/// Scales this far below the coarsest one survive
/// [`leave_viewport`](TileView::leave_viewport); everything finer is dropped.
pub const KEEP_SCALE_OFFSET: u32 = 2;

type Key = (u32, TilePos);

/// What to draw for one requested tile.
#[derive(Clone, Debug)]
pub enum TileLookup {
    Exact(TileEntry),
    /// A coarser tile covering the requested one. It must be drawn
    /// `2^downscale` times larger, cropped to the requested footprint.
    Fallback { tile: TileEntry, downscale: u32 },
    Placeholder,
}

impl TileLookup {
    pub fn tile(&self) -> Option<&TileEntry> {
        match self {
            Self::Exact(tile) | Self::Fallback { tile, .. } => Some(tile),
            Self::Placeholder => None,
        }
    }

    /// Linear stretch factor for drawing [`tile`](Self::tile).
    pub fn stretch(&self) -> u32 {
        match self {
            Self::Fallback { downscale, .. } => 1u32.checked_shl(*downscale).unwrap_or(u32::MAX),
            _ => 1,
        }
    }
}

/// Render-side tile cache of one image.
pub struct TileView {
    file: FileEntry,
    source: TileSourceHandle,
    replies: Mailbox<TileReply>,
    tiles: HashMap<Key, TileEntry>,
    pending: HashMap<Key, JobHandle>,
    missing: HashSet<Key>,
}

impl TileView {
    pub fn new(file: FileEntry, source: TileSourceHandle) -> Self {
        Self {
            file,
            source,
            replies: Mailbox::new(),
            tiles: HashMap::new(),
            pending: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    pub fn file(&self) -> &FileEntry {
        &self.file
    }

    /// Tiles held in the render cache.
    pub fn cached(&self) -> usize {
        self.tiles.len()
    }

    /// Requests not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// What to draw for tile `pos` at `scale`, without blocking.
    ///
    /// A tile not in the render cache is requested, unless a request for it
    /// is already out or the source has reported it missing. Meanwhile the
    /// nearest coarser tile stands in for it.
    pub fn get_tile(&mut self, scale: u32, pos: TilePos) -> TileLookup {
        if let Some(tile) = self.tiles.get(&(scale, pos)) {
            return TileLookup::Exact(tile.clone());
        }
        // Nothing exists above the coarsest level.
        let max_scale = self.file.max_scale();
        if scale > max_scale {
            return TileLookup::Placeholder;
        }
        self.request(scale, pos);

        let mut downscale = 1;
        while let Some(coarser) = scale.checked_add(downscale).filter(|coarser| *coarser <= max_scale) {
            if let Some(tile) = self.tiles.get(&(coarser, pos.coarser(downscale))) {
                return TileLookup::Fallback { tile: tile.clone(), downscale };
            }
            downscale += 1;
        }
        TileLookup::Placeholder
    }

    fn request(&mut self, scale: u32, pos: TilePos) {
        let key = (scale, pos);
        if self.pending.contains_key(&key) || self.missing.contains(&key) {
            return;
        }
        let handle = self.source.request(&self.file, scale, pos, self.replies.clone());
        self.pending.insert(key, handle);
    }

    /// Take in every reply that has arrived. Returns the number of tiles
    /// added to the render cache.
    pub fn process_queue(&mut self) -> usize {
        let mut added = 0;
        for reply in self.replies.drain() {
            match reply {
                TileReply::Ready(tile) => {
                    let key = (tile.scale, tile.pos);
                    self.pending.remove(&key);
                    if tile.file_id == self.file.id {
                        self.tiles.insert(key, tile);
                        added += 1;
                    }
                },
                TileReply::Missing { file_id, scale, pos } => {
                    self.pending.remove(&(scale, pos));
                    if file_id == self.file.id {
                        self.missing.insert((scale, pos));
                    }
                },
            }
        }
        added
    }

    /// Block until every outstanding request job has finished, then take in
    /// the replies. Replies from regeneration may still arrive later.
    pub fn settle(&mut self) -> usize {
        for handle in self.pending.values() {
            handle.wait();
        }
        self.process_queue()
    }

    /// The image scrolled out of view: drop fine tiles and stop asking for
    /// more.
    pub fn leave_viewport(&mut self) {
        let keep = self.file.max_scale().saturating_sub(KEEP_SCALE_OFFSET);
        let before = self.tiles.len();
        self.tiles.retain(|(scale, _), _| *scale >= keep);
        self.abort_pending();
        tracing::trace!(file_id = %self.file.id, evicted = before - self.tiles.len(), "left viewport");
    }

    /// Forget everything, for example after the file's tiles were
    /// regenerated.
    pub fn refresh(&mut self, file: FileEntry) {
        self.abort_pending();
        self.replies.drain();
        self.tiles.clear();
        self.missing.clear();
        self.file = file;
    }

    fn abort_pending(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

impl Drop for TileView {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
