use crate::error::ErrorKind;
use derive_more::Display;
use mosaic_archive::ArchiveFormat;
use mosaic_blob::BlobInfo;
use mosaic_cache::{FileEntry, TileEntry, TileFormat};
use mosaic_locator::ResourceLocator;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ResourceKind {
    #[display("archive")]
    Archive,
    #[display("image")]
    Image,
}

/// Typed identity of a resolved resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceInfo {
    pub locator: ResourceLocator,
    pub kind: ResourceKind,
    /// `None` for directories, which have no bytes of their own.
    pub blob: Option<BlobInfo>,
}

/// Listing of an archive's members, in archive order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub format: ArchiveFormat,
    pub members: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub max_scale: u32,
    pub format: TileFormat,
}

/// Tiles produced for one image.
#[derive(Clone, Debug)]
pub struct ImageData {
    pub info: ImageInfo,
    pub file: FileEntry,
    pub tiles: Vec<TileEntry>,
}

/// Terminal outcome of a node, reported through `on_success` or `on_error`.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    #[display("success")]
    Success,
    #[display("unsupported format")]
    UnsupportedFormat,
    #[display("blob fetch error")]
    BlobFetchError,
    #[display("decode error")]
    DecodeError,
    #[display("persistence error")]
    PersistenceError,
    #[display("cancelled")]
    Cancelled,
}

impl From<&ErrorKind> for ResourceStatus {
    fn from(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::UnsupportedFormat(_) => Self::UnsupportedFormat,
            ErrorKind::Fetch(_) => Self::BlobFetchError,
            ErrorKind::Archive(_) | ErrorKind::Decode(_) | ErrorKind::Encode | ErrorKind::Panicked(_) => {
                Self::DecodeError
            },
            ErrorKind::Persistence(_) => Self::PersistenceError,
            ErrorKind::Cancelled => Self::Cancelled,
        }
    }
}

/// How much of a pyramid to generate.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum Mode {
    /// Only the coarsest few levels, enough for thumbnails.
    #[display("quick")]
    Quick,
    /// Every level down to full resolution. The quick levels come first and
    /// the rest follows at low priority.
    #[default]
    #[display("full")]
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    /// Number of coarse levels generated immediately.
    pub quick_levels: u32,
    pub jpeg_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self { mode: Mode::Full, quick_levels: 3, jpeg_quality: 85 }
    }
}
