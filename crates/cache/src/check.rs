use crate::models::{FileEntry, FileId};

/// Findings of [`TileDatabase::check`](crate::TileDatabase::check).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Files referenced by tiles but missing from `files`.
    pub orphaned_tiles: Vec<FileId>,
    /// Entries that have no tiles at all.
    pub entries_without_tiles: Vec<FileEntry>,
    /// Entries with tiles coarser than their own max scale, with the
    /// coarsest stored scale.
    pub tiles_beyond_max_scale: Vec<(FileEntry, u32)>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_tiles.is_empty() && self.entries_without_tiles.is_empty() && self.tiles_beyond_max_scale.is_empty()
    }
}
