use crate::ArchiveSource;
use crate::error::{ErrorKind, Result};
use bzip2::read::BzDecoder;
use exn::ResultExt;
use flate2::read::MultiGzDecoder;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tar::Archive;

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Outer compression of a tarball, detected from its first bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compression {
    None,
    Bzip2,
    Gzip,
}
impl Compression {
    fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Self::Bzip2;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Self::Gzip;
        }
        Self::None
    }
}

fn open(source: &ArchiveSource) -> Result<Archive<Box<dyn Read + '_>>> {
    let mut reader = BufReader::new(source.open()?);
    let compression = Compression::from_magic_bytes(reader.fill_buf().or_raise(|| ErrorKind::Io)?);
    tracing::trace!(?compression, "opening tarball");
    let decoder: Box<dyn Read + '_> = match compression {
        Compression::None => Box::new(reader),
        Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
    };
    Ok(Archive::new(decoder))
}

pub(crate) fn list(source: &ArchiveSource) -> Result<Vec<String>> {
    let mut archive = open(source)?;
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for entry in archive.entries().or_raise(|| ErrorKind::Corrupt)? {
        let entry = entry.or_raise(|| ErrorKind::Corrupt)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().or_raise(|| ErrorKind::Corrupt)?.to_string_lossy().into_owned();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Tarballs are a stream: finding a member means reading every entry before it.
pub(crate) fn read(source: &ArchiveSource, member: &str) -> Result<Vec<u8>> {
    let mut archive = open(source)?;
    for entry in archive.entries().or_raise(|| ErrorKind::Corrupt)? {
        let mut entry = entry.or_raise(|| ErrorKind::Corrupt)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if entry.path().or_raise(|| ErrorKind::Corrupt)?.to_string_lossy() != member {
            continue;
        }
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry.read_to_end(&mut bytes).or_raise(|| ErrorKind::Corrupt)?;
        return Ok(bytes);
    }
    exn::bail!(ErrorKind::MemberNotFound(member.to_string()))
}

pub(crate) fn extract(source: &ArchiveSource, target: &Path) -> Result<()> {
    open(source)?.unpack(target).or_raise(|| ErrorKind::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"ustar", Compression::None)]
    #[case(&[], Compression::None)]
    #[case(&[0x42, 0x5A, 0x68, 0x39], Compression::Bzip2)]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Compression::Gzip)]
    fn test_outer_compression(#[case] bytes: &[u8], #[case] expected: Compression) {
        assert_eq!(Compression::from_magic_bytes(bytes), expected);
    }
}
