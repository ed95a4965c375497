use crate::error::{ErrorKind, Result};
use crate::{ArchiveFormat, ArchiveSource};
use tracing::instrument;

/// Registry of archive formats.
///
/// Selection order: a directory path goes to [`ArchiveFormat::Directory`];
/// otherwise the first registered format whose magic signature matches the
/// leading bytes wins, falling back to the first whose extension matches the
/// name hint.
#[derive(Clone, Debug)]
pub struct ArchiveManager {
    formats: Vec<ArchiveFormat>,
}

impl Default for ArchiveManager {
    fn default() -> Self {
        Self::new(ArchiveFormat::ALL)
    }
}

impl ArchiveManager {
    pub fn new(formats: impl IntoIterator<Item = ArchiveFormat>) -> Self {
        let mut registered: Vec<ArchiveFormat> = Vec::new();
        for format in formats {
            if !registered.contains(&format) {
                registered.push(format);
            }
        }
        Self { formats: registered }
    }

    pub fn formats(&self) -> &[ArchiveFormat] {
        &self.formats
    }

    /// Pure selection over a byte prefix and optional file name.
    pub fn select_by_prefix(&self, prefix: &[u8], name: Option<&str>) -> Option<ArchiveFormat> {
        if let Some(format) = self.formats.iter().find(|format| format.matches_magic(prefix)) {
            return Some(*format);
        }
        let name = name?;
        self.formats.iter().find(|format| format.matches_name(name)).copied()
    }

    /// Identify the format of `source`, or `None` if no registered format
    /// claims it.
    pub fn detect(&self, source: &ArchiveSource, name: Option<&str>) -> Result<Option<ArchiveFormat>> {
        if source.is_directory() {
            return Ok(self.formats.contains(&ArchiveFormat::Directory).then_some(ArchiveFormat::Directory));
        }
        Ok(self.select_by_prefix(&source.prefix()?, name))
    }

    /// Like [`detect`](Self::detect), but a miss is an
    /// [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) error.
    pub fn select(&self, source: &ArchiveSource, name: Option<&str>) -> Result<ArchiveFormat> {
        match self.detect(source, name)? {
            Some(format) => Ok(format),
            None => exn::bail!(ErrorKind::UnsupportedFormat(name.unwrap_or("<unnamed>").to_string())),
        }
    }

    /// Select a format and list members with it.
    #[instrument(level = "debug", skip(self, source))]
    pub fn list_members(&self, source: &ArchiveSource, name: Option<&str>) -> Result<(ArchiveFormat, Vec<String>)> {
        let format = self.select(source, name)?;
        Ok((format, format.list_members(source)?))
    }

    /// Select a format and read one member with it.
    #[instrument(level = "debug", skip(self, source))]
    pub fn read_member(&self, source: &ArchiveSource, name: Option<&str>, member: &str) -> Result<Vec<u8>> {
        self.select(source, name)?.read_member(source, member)
    }
}
