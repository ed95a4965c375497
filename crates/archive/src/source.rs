use crate::construct::SNIFF_LEN;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir, TempPath};

pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// The container being read: either bytes already in memory, or something on
/// the local filesystem (a file, or a directory for [`Directory`]).
///
/// [`Directory`]: crate::ArchiveFormat::Directory
#[derive(Clone, Debug)]
pub enum ArchiveSource {
    Bytes(Arc<[u8]>),
    Path(PathBuf),
}

impl From<Arc<[u8]>> for ArchiveSource {
    fn from(bytes: Arc<[u8]>) -> Self {
        Self::Bytes(bytes)
    }
}
impl From<Vec<u8>> for ArchiveSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}
impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl ArchiveSource {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Path(path) if path.is_dir())
    }

    /// Leading bytes used for magic detection. Empty for directories.
    pub(crate) fn prefix(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..bytes.len().min(SNIFF_LEN)])),
            Self::Path(path) if path.is_dir() => Ok(Cow::Borrowed(&[])),
            Self::Path(path) => {
                let file = File::open(path).or_raise(|| ErrorKind::Io)?;
                let mut prefix = Vec::with_capacity(SNIFF_LEN);
                file.take(SNIFF_LEN as u64).read_to_end(&mut prefix).or_raise(|| ErrorKind::Io)?;
                Ok(Cow::Owned(prefix))
            },
        }
    }

    pub(crate) fn open(&self) -> Result<Box<dyn ReadSeek + '_>> {
        match self {
            Self::Bytes(bytes) => Ok(Box::new(Cursor::new(&bytes[..]))),
            Self::Path(path) if path.is_dir() => exn::bail!(ErrorKind::Corrupt),
            Self::Path(path) => Ok(Box::new(BufReader::new(File::open(path).or_raise(|| ErrorKind::Io)?))),
        }
    }

    /// A real file holding the archive, for loaders that shell out.
    pub(crate) fn materialize(&self) -> Result<Materialized<'_>> {
        match self {
            Self::Path(path) => Ok(Materialized::Borrowed(path)),
            Self::Bytes(bytes) => {
                let mut tmp = NamedTempFile::with_prefix("mosaic-").or_raise(|| ErrorKind::Io)?;
                tmp.write_all(bytes).or_raise(|| ErrorKind::Io)?;
                tmp.flush().or_raise(|| ErrorKind::Io)?;
                Ok(Materialized::Temporary(tmp))
            },
        }
    }
}

pub(crate) enum Materialized<'a> {
    Borrowed(&'a Path),
    Temporary(NamedTempFile),
}
impl Materialized<'_> {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Self::Borrowed(path) => *path,
            Self::Temporary(tmp) => tmp.path(),
        }
    }
}

/// A member available as a real file. Temporary variants delete themselves
/// when dropped.
#[derive(Debug)]
pub enum MemberPath {
    /// The member already exists on disk (directory archives).
    Direct(PathBuf),
    /// The member was copied out into a temporary file.
    Temporary(TempPath),
    /// The member was extracted by an external tool into a temporary directory.
    Extracted { dir: TempDir, path: PathBuf },
}
impl MemberPath {
    pub fn path(&self) -> &Path {
        match self {
            Self::Direct(path) => path.as_path(),
            Self::Temporary(path) => &**path,
            Self::Extracted { path, .. } => path.as_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_of_bytes_is_capped() {
        let source = ArchiveSource::from(vec![7u8; SNIFF_LEN * 2]);
        assert_eq!(source.prefix().unwrap().len(), SNIFF_LEN);
        let short = ArchiveSource::from(vec![1u8, 2, 3]);
        assert_eq!(&*short.prefix().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_materialized_bytes_are_written_to_disk() {
        let source = ArchiveSource::from(b"archive bytes".to_vec());
        let materialized = source.materialize().unwrap();
        assert_eq!(std::fs::read(materialized.path()).unwrap(), b"archive bytes");
    }

    #[test]
    fn test_directory_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = ArchiveSource::Path(dir.path().to_path_buf());
        assert!(source.is_directory());
        assert!(source.prefix().unwrap().is_empty());
    }
}
