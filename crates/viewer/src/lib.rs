//! Viewer-side tile access.
//!
//! A [`TileView`] answers "what should be drawn for this tile" immediately:
//! the exact tile if it has one, otherwise the nearest coarser tile it has
//! to be stretched over the gap, otherwise a placeholder. Missing tiles are
//! requested from a [`TileSource`] in the background.

mod source;
mod view;

pub use crate::source::{CacheTileSource, TileReply, TileSource, TileSourceHandle};
pub use crate::view::{KEEP_SCALE_OFFSET, TileLookup, TileView};
