use crate::error::{ErrorKind, Result};
use crate::sevenzip::SevenZip;
use crate::{ArchiveFormat, ArchiveSource, MemberPath, directory, tarball, zipfile};
use exn::ResultExt;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::instrument;

impl ArchiveFormat {
    /// Names of every regular file in the archive, in archive order. Every
    /// listed name can be passed to [`read_member`](Self::read_member).
    #[instrument(level = "debug", skip(source), fields(members))]
    pub fn list_members(&self, source: &ArchiveSource) -> Result<Vec<String>> {
        let members = match self {
            Self::Zip => zipfile::list(source)?,
            Self::SevenZip => SevenZip::discover()?.list(source.materialize()?.path())?,
            Self::Tar => tarball::list(source)?,
            Self::Directory => directory::list(source)?,
        };
        tracing::Span::current().record("members", members.len());
        Ok(members)
    }

    /// Read one member fully into memory.
    #[instrument(level = "debug", skip(source))]
    pub fn read_member(&self, source: &ArchiveSource, member: &str) -> Result<Vec<u8>> {
        match self {
            Self::Zip => zipfile::read(source, member),
            Self::SevenZip => SevenZip::discover()?.read(source.materialize()?.path(), member),
            Self::Tar => tarball::read(source, member),
            Self::Directory => directory::read(source, member),
        }
    }

    /// Make one member available as a real file, for consumers that can only
    /// work with a filesystem path.
    #[instrument(level = "debug", skip(source))]
    pub fn member_as_path(&self, source: &ArchiveSource, member: &str) -> Result<MemberPath> {
        match self {
            Self::Directory => Ok(MemberPath::Direct(directory::member_path(source, member)?)),
            Self::SevenZip => {
                let archive = source.materialize()?;
                let dir = tempfile::Builder::new().prefix("mosaic-").tempdir().or_raise(|| ErrorKind::Io)?;
                SevenZip::discover()?.extract(archive.path(), dir.path(), Some(member))?;
                let path = dir.path().join(crate::path::validate(member)?);
                if !path.is_file() {
                    exn::bail!(ErrorKind::MemberNotFound(member.to_string()));
                }
                Ok(MemberPath::Extracted { dir, path })
            },
            Self::Zip | Self::Tar => {
                let bytes = self.read_member(source, member)?;
                // Keep the extension; some consumers sniff by name.
                let suffix = Path::new(member)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| format!(".{ext}"))
                    .unwrap_or_default();
                let mut tmp = tempfile::Builder::new()
                    .prefix("mosaic-")
                    .suffix(&suffix)
                    .tempfile()
                    .or_raise(|| ErrorKind::Io)?;
                tmp.write_all(&bytes).or_raise(|| ErrorKind::Io)?;
                tmp.flush().or_raise(|| ErrorKind::Io)?;
                Ok(MemberPath::Temporary(tmp.into_temp_path()))
            },
        }
    }

    /// Extract every member beneath `target`, creating it if needed.
    #[instrument(level = "debug", skip(source, target), fields(target = %target.display()))]
    pub fn extract_all(&self, source: &ArchiveSource, target: &Path) -> Result<()> {
        fs::create_dir_all(target).or_raise(|| ErrorKind::Io)?;
        match self {
            Self::Zip => zipfile::extract(source, target),
            Self::SevenZip => SevenZip::discover()?.extract(source.materialize()?.path(), target, None),
            Self::Tar => tarball::extract(source, target),
            Self::Directory => directory::extract(source, target),
        }
    }

    /// Whether a single member can be reached without reading everything
    /// stored before it.
    pub fn is_seekable(&self) -> bool {
        match self {
            Self::Zip | Self::Directory => true,
            Self::SevenZip | Self::Tar => false,
        }
    }
}
