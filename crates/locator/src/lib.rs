//! Addressable identities for resources that may live inside archives.
//!
//! A [`ResourceLocator`] is a chain of segments: the first names a top-level
//! source (`file:///photos/a.zip`, `https://example.com/b.tar`), every later
//! segment names a member inside the archive named by the segment before it.
//!
//! The string form joins segments with `!`:
//!
//! ```
//! use mosaic_locator::ResourceLocator;
//!
//! let locator: ResourceLocator = "file:///photos/a.zip!inner.tar!b.jpg".parse().unwrap();
//! assert_eq!(locator.members(), ["inner.tar", "b.jpg"]);
//! assert_eq!(locator.parent().unwrap().to_string(), "file:///photos/a.zip!inner.tar");
//! assert_eq!(locator.to_string().parse::<ResourceLocator>().unwrap(), locator);
//! ```
//!
//! A literal `!` or `\` inside a segment is escaped with a backslash, which
//! keeps the string form reversible for every possible member name.

mod construct;
pub mod error;

use std::fmt;
use std::path::{Path, PathBuf};

/// Separator between locator segments.
pub const SEPARATOR: char = '!';
/// Escape character for literal separators (and itself) inside a segment.
pub const ESCAPE: char = '\\';

/// Where the top-level bytes of a locator come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scheme {
    File,
    Http,
    Https,
}
impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Whether resolving this scheme requires the network collaborator.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}
impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an addressable resource.
///
/// Two locators are equal iff their segment sequences are equal element-wise.
/// The derived ordering (scheme, then path, then members) makes locators
/// usable as keys in ordered maps.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceLocator {
    scheme: Scheme,
    path: String,
    members: Vec<String>,
}

impl ResourceLocator {
    /// A top-level locator with no archive members.
    pub fn new(scheme: Scheme, path: impl Into<String>) -> Self {
        Self { scheme, path: path.into(), members: Vec::new() }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Path of the top-level source (for `file`, an absolute filesystem path;
    /// for `http(s)`, everything after `://`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Member names, outermost archive first.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of segments, including the top-level source.
    pub fn depth(&self) -> usize {
        self.members.len() + 1
    }

    pub fn is_nested(&self) -> bool {
        !self.members.is_empty()
    }

    /// The locator with its last segment removed, or `None` for a top-level
    /// locator.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.members.split_last()?;
        Some(Self { scheme: self.scheme, path: self.path.clone(), members: rest.to_vec() })
    }

    /// A new locator naming `member` inside the archive this locator names.
    #[must_use]
    pub fn child(&self, member: impl Into<String>) -> Self {
        let mut members = self.members.clone();
        members.push(member.into());
        Self { scheme: self.scheme, path: self.path.clone(), members }
    }

    /// The first segment on its own.
    #[must_use]
    pub fn top_level(&self) -> Self {
        Self::new(self.scheme, self.path.clone())
    }

    /// Unescaped URL of the top-level source, suitable for fetching.
    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.path)
    }

    /// Final segment, as written.
    pub fn last_segment(&self) -> &str {
        self.members.last().map(String::as_str).unwrap_or(&self.path)
    }

    /// File name of the final segment (the part after the last `/`), used for
    /// extension matching.
    pub fn file_name(&self) -> Option<&str> {
        let last = self.last_segment().trim_end_matches('/');
        let name = last.rsplit('/').next().unwrap_or(last);
        (!name.is_empty()).then_some(name)
    }

    /// Filesystem path of the top-level source when it is a local file.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.scheme {
            Scheme::File => Some(PathBuf::from(&self.path)),
            _ => None,
        }
    }

    /// Build a `file://` locator from a filesystem path, made absolute against
    /// the current directory.
    pub fn from_path(path: impl AsRef<Path>) -> error::Result<Self> {
        use crate::error::ErrorKind;
        use exn::{OptionExt, ResultExt};
        let path = path.as_ref();
        let invalid = || ErrorKind::InvalidPath(path.display().to_string());
        let absolute = std::path::absolute(path).or_raise(invalid)?;
        let absolute = absolute.to_str().ok_or_raise(invalid)?;
        Ok(Self::new(Scheme::File, absolute))
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, construct::escape(&self.path))?;
        for member in &self.members {
            write!(f, "{SEPARATOR}{}", construct::escape(member))?;
        }
        Ok(())
    }
}
