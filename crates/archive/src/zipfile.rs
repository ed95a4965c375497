use crate::ArchiveSource;
use crate::error::{ErrorKind, Result};
use crate::source::ReadSeek;
use ::zip::ZipArchive;
use ::zip::result::ZipError;
use exn::ResultExt;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

fn open(source: &ArchiveSource) -> Result<ZipArchive<Box<dyn ReadSeek + '_>>> {
    ZipArchive::new(source.open()?).or_raise(|| ErrorKind::Corrupt)
}

pub(crate) fn list(source: &ArchiveSource) -> Result<Vec<String>> {
    let mut archive = open(source)?;
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive.by_index(index).or_raise(|| ErrorKind::Corrupt)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    Ok(names)
}

pub(crate) fn read(source: &ArchiveSource, member: &str) -> Result<Vec<u8>> {
    let mut archive = open(source)?;
    let mut file = match archive.by_name(member) {
        Ok(file) if !file.is_dir() => file,
        Ok(_) | Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::MemberNotFound(member.to_string())),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Corrupt),
    };
    let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
    file.read_to_end(&mut bytes).or_raise(|| ErrorKind::Corrupt)?;
    Ok(bytes)
}

pub(crate) fn extract(source: &ArchiveSource, target: &Path) -> Result<()> {
    let mut archive = open(source)?;
    archive.extract(target).or_raise(|| ErrorKind::Io)
}
