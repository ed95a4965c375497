use crate::error::{Error, ErrorKind};
use crate::models::TileFormat;
use crate::pyramid;
use derive_more::Display;
use exn::ResultExt;
use time::UtcDateTime;

/// Primary key of a row in `files`.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub i64);

/// Persisted record of one image resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub id: FileId,
    /// Locator string, unique across the database.
    pub url: String,
    pub size: u64,
    /// Modification time of the top-level source, when it is a local file.
    pub mtime: Option<UtcDateTime>,
    pub width: u32,
    pub height: u32,
    pub format: TileFormat,
}

impl FileEntry {
    pub fn max_scale(&self) -> u32 {
        pyramid::max_scale(self.width, self.height)
    }

    /// The insertable form of this entry, for copying it elsewhere.
    pub fn to_new(&self) -> NewFileEntry {
        NewFileEntry {
            url: self.url.clone(),
            size: self.size,
            mtime: self.mtime,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

/// A file entry not yet assigned an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFileEntry {
    pub url: String,
    pub size: u64,
    pub mtime: Option<UtcDateTime>,
    pub width: u32,
    pub height: u32,
    pub format: TileFormat,
}

impl NewFileEntry {
    /// Stored form of the mtime. Sub-second precision is not kept.
    pub(crate) fn mtime_stamp(&self) -> Option<i64> {
        self.mtime.map(UtcDateTime::unix_timestamp)
    }
}

/// What [`store_file_entry`](crate::TileDatabase::store_file_entry) did.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Freshness {
    /// No entry existed for the url.
    #[display("created")]
    Created,
    /// An entry with the same mtime existed and was kept with its tiles.
    #[display("unchanged")]
    Unchanged,
    /// An entry with a different mtime existed; its tiles were dropped.
    #[display("refreshed")]
    Refreshed,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) file_id: i64,
    pub(crate) url: String,
    pub(crate) size: i64,
    pub(crate) mtime: Option<i64>,
    pub(crate) width: i64,
    pub(crate) height: i64,
    pub(crate) format: i64,
}

impl TryFrom<&NewFileEntry> for FileRow {
    type Error = Error;
    fn try_from(entry: &NewFileEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            file_id: 0,
            url: entry.url.clone(),
            size: i64::try_from(entry.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mtime: entry.mtime_stamp(),
            width: i64::from(entry.width),
            height: i64::from(entry.height),
            format: i64::from(entry.format),
        })
    }
}

impl TryFrom<FileRow> for FileEntry {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FileId(row.file_id),
            url: row.url,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mtime: row
                .mtime
                .map(UtcDateTime::from_unix_timestamp)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("modification time"))?,
            width: u32::try_from(row.width).or_raise(|| ErrorKind::InvalidData("width"))?,
            height: u32::try_from(row.height).or_raise(|| ErrorKind::InvalidData("height"))?,
            format: TileFormat::try_from(row.format)?,
        })
    }
}
