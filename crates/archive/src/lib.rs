//! Uniform access to members of container formats.
//!
//! Every supported container is a variant of the closed [`ArchiveFormat`]
//! enum, which offers the same capability set regardless of format:
//!
//! - **Detection** by magic bytes ([`ArchiveFormat::from_magic_bytes`]) or by
//!   file name extension ([`ArchiveFormat::from_name`])
//! - **Listing** members in archive order ([`ArchiveFormat::list_members`])
//! - **Reading** one member into memory ([`ArchiveFormat::read_member`]), or
//!   onto disk for consumers that need a real file
//!   ([`ArchiveFormat::member_as_path`])
//! - **Extracting** everything into a directory ([`ArchiveFormat::extract_all`])
//!
//! [`ArchiveManager`] holds the registered variants and picks the right one for
//! a given [`ArchiveSource`].
//!
//! Zip and tar (optionally gzip or bzip2 compressed) are read in-process. 7z
//! archives are handed to a `7z`, `7za` or `7zr` executable found on `PATH`.
//! Directories act as archives whose members are the files beneath them.

mod construct;
mod directory;
pub mod error;
mod manager;
mod ops;
mod path;
mod sevenzip;
mod source;
mod tarball;
mod zipfile;

pub use crate::construct::Signature;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::manager::ArchiveManager;
pub use crate::path::validate as validate_member;
pub use crate::source::{ArchiveSource, MemberPath};

/// A supported container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArchiveFormat {
    /// Zip archives (.zip, .cbz)
    Zip,
    /// 7-Zip archives (.7z, .cb7), via an external executable
    SevenZip,
    /// Tar archives, plain or compressed (.tar, .tar.gz, .tgz, .tar.bz2, ...)
    Tar,
    /// A directory on the local filesystem
    Directory,
}

impl ArchiveFormat {
    /// Every format, in default registration order.
    pub const ALL: [ArchiveFormat; 4] = [Self::Zip, Self::SevenZip, Self::Tar, Self::Directory];
}
