use crate::ArchiveSource;
use crate::error::{ErrorKind, Result};
use crate::path::{member_name, validate};
use exn::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn root(source: &ArchiveSource) -> Result<&Path> {
    match source {
        ArchiveSource::Path(path) if path.is_dir() => Ok(path),
        _ => exn::bail!(ErrorKind::NotADirectory),
    }
}

fn map_io_error(e: std::io::Error, member: &str) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::MemberNotFound(member.to_string()),
        _ => ErrorKind::Io,
    }
}

/// Every regular file beneath the directory, sorted, named relative to it.
pub(crate) fn list(source: &ArchiveSource) -> Result<Vec<String>> {
    let root = root(source)?;
    let mut names = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.or_raise(|| ErrorKind::Io)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        match member_name(relative) {
            Some(name) => names.push(name),
            None => tracing::warn!(path = %entry.path().display(), "skipping file with non-UTF-8 name"),
        }
    }
    Ok(names)
}

pub(crate) fn member_path(source: &ArchiveSource, member: &str) -> Result<PathBuf> {
    let path = root(source)?.join(validate(member)?);
    if !path.is_file() {
        exn::bail!(ErrorKind::MemberNotFound(member.to_string()));
    }
    Ok(path)
}

pub(crate) fn read(source: &ArchiveSource, member: &str) -> Result<Vec<u8>> {
    let path = member_path(source, member)?;
    Ok(fs::read(&path).map_err(|e| map_io_error(e, member))?)
}

pub(crate) fn extract(source: &ArchiveSource, target: &Path) -> Result<()> {
    for member in list(source)? {
        let from = member_path(source, &member)?;
        let to = target.join(validate(&member)?);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
        }
        fs::copy(&from, &to).or_raise(|| ErrorKind::Io)?;
    }
    Ok(())
}
