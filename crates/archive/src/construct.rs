use crate::ArchiveFormat;
use crate::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

/// How many leading bytes detection needs to look at. Tar keeps its magic at
/// offset 257, so this has to cover a full header block.
pub(crate) const SNIFF_LEN: usize = 512;

/// A magic byte sequence expected at a fixed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub offset: usize,
    pub bytes: &'static [u8],
}
impl Signature {
    const fn at_start(bytes: &'static [u8]) -> Self {
        Self { offset: 0, bytes }
    }

    pub fn matches(&self, prefix: &[u8]) -> bool {
        prefix.get(self.offset..self.offset + self.bytes.len()) == Some(self.bytes)
    }
}

const ZIP_MAGIC: [Signature; 3] = [
    // regular archive
    Signature::at_start(b"PK\x03\x04"),
    // empty archive
    Signature::at_start(b"PK\x05\x06"),
    // spanned archive
    Signature::at_start(b"PK\x07\x08"),
];
const SEVEN_ZIP_MAGIC: [Signature; 1] = [Signature::at_start(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C])];
// POSIX ustar and GNU tar both put "ustar" here. Compressed tarballs carry the
// compressor's magic instead, so they can only be matched by extension.
const TAR_MAGIC: [Signature; 1] = [Signature { offset: 257, bytes: b"ustar" }];

const ZIP_EXTENSIONS: [&str; 2] = ["zip", "cbz"];
const SEVEN_ZIP_EXTENSIONS: [&str; 2] = ["7z", "cb7"];
const TAR_EXTENSIONS: [&str; 8] = ["tar", "tar.gz", "tgz", "tar.bz2", "tbz", "tbz2", "tb2", "cbt"];

impl ArchiveFormat {
    pub fn magic_signatures(&self) -> &'static [Signature] {
        match self {
            Self::Zip => &ZIP_MAGIC,
            Self::SevenZip => &SEVEN_ZIP_MAGIC,
            Self::Tar => &TAR_MAGIC,
            Self::Directory => &[],
        }
    }

    /// File name extensions (lowercase, without leading dot).
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Zip => &ZIP_EXTENSIONS,
            Self::SevenZip => &SEVEN_ZIP_EXTENSIONS,
            Self::Tar => &TAR_EXTENSIONS,
            Self::Directory => &[],
        }
    }

    pub fn matches_magic(&self, prefix: &[u8]) -> bool {
        self.magic_signatures().iter().any(|signature| signature.matches(prefix))
    }

    /// Case-insensitive extension match. Multi-part extensions (`tar.gz`)
    /// are matched as a whole, and a bare dotfile (`.zip`) has no extension.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.extensions().iter().any(|ext| {
            name.strip_suffix(ext)
                .and_then(|stem| stem.strip_suffix('.'))
                .is_some_and(|stem| !stem.is_empty())
        })
    }

    /// Detect a format from magic bytes, in [`ArchiveFormat::ALL`] order.
    #[must_use]
    pub fn from_magic_bytes(prefix: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.matches_magic(prefix))
    }

    /// Detect a format from a file name, in [`ArchiveFormat::ALL`] order.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.matches_name(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Tar => "tar",
            Self::Directory => "directory",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zip" | "cbz" => Ok(Self::Zip),
            "7z" | "7zip" | "sevenzip" => Ok(Self::SevenZip),
            "tar" => Ok(Self::Tar),
            "dir" | "directory" => Ok(Self::Directory),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tar_header() -> Vec<u8> {
        let mut header = vec![0u8; SNIFF_LEN];
        header[257..262].copy_from_slice(b"ustar");
        header
    }

    #[rstest]
    #[case(b"PK\x03\x04rest", Some(ArchiveFormat::Zip))]
    #[case(b"PK\x05\x06", Some(ArchiveFormat::Zip))]
    #[case(b"PK\x07\x08", Some(ArchiveFormat::Zip))]
    #[case(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04], Some(ArchiveFormat::SevenZip))]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0], None)]
    #[case(b"\x89PNG\r\n\x1a\n", None)]
    #[case(b"PK", None)]
    #[case(b"", None)]
    fn test_from_magic_bytes(#[case] bytes: &[u8], #[case] expected: Option<ArchiveFormat>) {
        assert_eq!(ArchiveFormat::from_magic_bytes(bytes), expected);
    }

    #[test]
    fn test_tar_magic_at_offset() {
        assert_eq!(ArchiveFormat::from_magic_bytes(&tar_header()), Some(ArchiveFormat::Tar));
        // Too short to reach offset 257.
        assert_eq!(ArchiveFormat::from_magic_bytes(&tar_header()[..260]), None);
    }

    #[rstest]
    #[case("comic.cbz", Some(ArchiveFormat::Zip))]
    #[case("PHOTOS.ZIP", Some(ArchiveFormat::Zip))]
    #[case("a.7z", Some(ArchiveFormat::SevenZip))]
    #[case("a.tar", Some(ArchiveFormat::Tar))]
    #[case("a.tar.gz", Some(ArchiveFormat::Tar))]
    #[case("a.tgz", Some(ArchiveFormat::Tar))]
    #[case("a.tar.bz2", Some(ArchiveFormat::Tar))]
    #[case(".zip", None)]
    #[case("a.gz", None)]
    #[case("a.jpg", None)]
    #[case("zip", None)]
    fn test_from_name(#[case] name: &str, #[case] expected: Option<ArchiveFormat>) {
        assert_eq!(ArchiveFormat::from_name(name), expected);
    }

    #[rstest]
    #[case("zip", ArchiveFormat::Zip)]
    #[case("7Z", ArchiveFormat::SevenZip)]
    #[case("tar", ArchiveFormat::Tar)]
    #[case("directory", ArchiveFormat::Directory)]
    fn test_from_str(#[case] input: &str, #[case] expected: ArchiveFormat) {
        assert_eq!(input.parse::<ArchiveFormat>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<ArchiveFormat>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn test_directory_never_matches_bytes_or_names() {
        assert!(!ArchiveFormat::Directory.matches_magic(b""));
        assert!(!ArchiveFormat::Directory.matches_name("photos"));
    }
}
