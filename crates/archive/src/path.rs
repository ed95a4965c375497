//! Member name validation.
//!
//! Member names come from archive listings and from locator strings, so they
//! are untrusted: a directory member must never resolve outside its root.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validates a member name and returns it as a relative, normalized path.
///
/// # Examples
///
/// ```
/// use mosaic_archive::validate_member;
/// use std::path::Path;
///
/// assert!(validate_member("album/photo.jpg").is_ok());
/// assert!(validate_member("../etc/passwd").is_err());
/// assert_eq!(validate_member("a/./b//../c.jpg").unwrap(), Path::new("a/c.jpg"));
/// ```
pub fn validate(name: &str) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidPath(name.to_string());
    let mut components = Vec::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but
                // truncate in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(components.into_iter().collect()),
    }
}

/// Render a relative path as a member name with `/` separators.
pub(crate) fn member_name(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("photo.jpg", "photo.jpg")]
    #[case("a/b/c.png", "a/b/c.png")]
    #[case("a//b/./c.png", "a/b/c.png")]
    #[case("a/b/../c.png", "a/c.png")]
    fn test_valid_members(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(validate(name).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../escape.jpg")]
    #[case("a/../../b.jpg")]
    #[case("/etc/passwd")]
    #[case("..")]
    #[case(".")]
    #[case("")]
    #[case("a\0b")]
    fn test_invalid_members(#[case] name: &str) {
        assert_eq!(*validate(name).unwrap_err(), ErrorKind::InvalidPath(name.to_string()));
    }

    #[test]
    fn test_member_name_joins_with_slashes() {
        assert_eq!(member_name(Path::new("a/b/c.jpg")).as_deref(), Some("a/b/c.jpg"));
        assert_eq!(member_name(Path::new("")), None);
    }
}
