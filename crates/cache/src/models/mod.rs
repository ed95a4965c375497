mod file;
mod tile;

pub use self::file::{FileEntry, FileId, Freshness, NewFileEntry};
pub(crate) use self::file::FileRow;
pub use self::tile::{TileEntry, TileFormat, TileKey, TilePos};
pub(crate) use self::tile::TileRow;
