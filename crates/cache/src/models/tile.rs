use crate::error::{Error, ErrorKind};
use crate::models::FileId;
use derive_more::Display;
use exn::ResultExt;
use std::fmt;
use std::sync::Arc;

/// Encoding of a tile payload.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum TileFormat {
    /// Opaque images.
    #[display("jpeg")]
    Jpeg,
    /// Images with an alpha channel.
    #[display("png")]
    Png,
}

impl From<TileFormat> for i64 {
    fn from(format: TileFormat) -> Self {
        match format {
            TileFormat::Jpeg => 0,
            TileFormat::Png => 1,
        }
    }
}

impl TryFrom<i64> for TileFormat {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Jpeg),
            1 => Ok(Self::Png),
            _ => exn::bail!(ErrorKind::InvalidData("tile format")),
        }
    }
}

/// Column and row of a tile within its scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TilePos {
    pub x: u32,
    pub y: u32,
}

impl TilePos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Position of the tile covering this one `levels` scales coarser.
    #[must_use]
    pub fn coarser(self, levels: u32) -> Self {
        Self { x: self.x.checked_shr(levels).unwrap_or(0), y: self.y.checked_shr(levels).unwrap_or(0) }
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Identity of a tile: unique per database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub file_id: FileId,
    pub scale: u32,
    pub pos: TilePos,
}

/// One encoded pyramid tile.
#[derive(Clone, PartialEq, Eq)]
pub struct TileEntry {
    pub file_id: FileId,
    pub scale: u32,
    pub pos: TilePos,
    pub format: TileFormat,
    pub payload: Arc<[u8]>,
}

impl TileEntry {
    pub fn new(file_id: FileId, scale: u32, pos: TilePos, format: TileFormat, payload: impl Into<Arc<[u8]>>) -> Self {
        Self { file_id, scale, pos, format, payload: payload.into() }
    }

    pub fn key(&self) -> TileKey {
        TileKey { file_id: self.file_id, scale: self.scale, pos: self.pos }
    }
}

impl fmt::Debug for TileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileEntry")
            .field("file_id", &self.file_id)
            .field("scale", &self.scale)
            .field("pos", &self.pos)
            .field("format", &self.format)
            .field("payload", &format_args!("{} bytes", self.payload.len()))
            .finish()
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TileRow {
    file_id: i64,
    scale: i64,
    x: i64,
    y: i64,
    format: i64,
    payload: Vec<u8>,
}

impl TryFrom<TileRow> for TileEntry {
    type Error = Error;
    fn try_from(row: TileRow) -> Result<Self, Self::Error> {
        let coordinate = |value: i64, what: &'static str| u32::try_from(value).or_raise(|| ErrorKind::InvalidData(what));
        Ok(Self {
            file_id: FileId(row.file_id),
            scale: coordinate(row.scale, "tile scale")?,
            pos: TilePos { x: coordinate(row.x, "tile x")?, y: coordinate(row.y, "tile y")? },
            format: TileFormat::try_from(row.format)?,
            payload: Arc::from(row.payload),
        })
    }
}
