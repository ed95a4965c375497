use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// An external 7-Zip executable.
pub(crate) struct SevenZip {
    path: PathBuf,
}
impl SevenZip {
    pub(crate) fn discover() -> Result<Self> {
        // Full build first; the reduced builds handle fewer codecs.
        let executables = ["7z", "7za", "7zr"];
        for exe in executables {
            if let Ok(path) = which::which(exe) {
                tracing::trace!(path = %path.display(), "discovered 7-Zip executable");
                return Ok(Self { path });
            }
        }
        tracing::info!("7-Zip executable not found in PATH");
        exn::bail!(ErrorKind::ToolNotFound);
    }

    fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.path).args(args).output().or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            tracing::debug!(code, stderr = %String::from_utf8_lossy(&output.stderr), "7-Zip failed");
            exn::bail!(ErrorKind::ToolFailed(code));
        }
        Ok(output.stdout)
    }

    pub(crate) fn list(&self, archive: &Path) -> Result<Vec<String>> {
        let stdout = self.run([OsStr::new("l"), OsStr::new("-slt"), OsStr::new("--"), archive.as_os_str()])?;
        Ok(parse_listing(&String::from_utf8_lossy(&stdout)))
    }

    pub(crate) fn read(&self, archive: &Path, member: &str) -> Result<Vec<u8>> {
        // `x -so` happily prints nothing for a name that isn't there.
        if !self.list(archive)?.iter().any(|name| name == member) {
            exn::bail!(ErrorKind::MemberNotFound(member.to_string()));
        }
        self.run([
            OsStr::new("x"),
            OsStr::new("-so"),
            OsStr::new("-spd"),
            OsStr::new("--"),
            archive.as_os_str(),
            OsStr::new(member),
        ])
    }

    pub(crate) fn extract(&self, archive: &Path, target: &Path, member: Option<&str>) -> Result<()> {
        let output = format!("-o{}", target.display());
        let mut args = vec![OsStr::new("x"), OsStr::new("-y"), OsStr::new("-spd"), OsStr::new(&output)];
        args.extend([OsStr::new("--"), archive.as_os_str()]);
        args.extend(member.map(OsStr::new));
        self.run(args).map(|_| ())
    }
}

/// Parse the `7z l -slt` technical listing. Entries follow a line of dashes
/// and are blank-line separated blocks of `Key = Value` pairs.
fn parse_listing(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let Some((_, body)) = text.split_once("\n----------\n") else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for block in body.split("\n\n") {
        let mut path = None;
        let mut folder = false;
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("Path = ") {
                path = Some(value);
            } else if line == "Folder = +" {
                folder = true;
            } else if let Some(attributes) = line.strip_prefix("Attributes = ")
                && attributes.starts_with('D')
            {
                folder = true;
            }
        }
        if let Some(path) = path
            && !folder
            && !names.iter().any(|name| name == path)
        {
            names.push(path.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
7-Zip [64] 16.02 : Copyright (c) 1999-2016 Igor Pavlov : 2016-05-21

Scanning the drive for archives:
1 file, 1234 bytes (2 KiB)

Listing archive: photos.7z

--
Path = photos.7z
Type = 7z
Physical Size = 1234

----------
Path = album
Size = 0
Folder = +
Attributes = D_ drwxr-xr-x

Path = album/b.jpg
Size = 1000
Folder = -
Attributes = A_ -rw-r--r--

Path = a.png
Size = 234
Folder = -
Attributes = A_ -rw-r--r--
";

    #[test]
    fn test_parse_listing_skips_folders_and_archive_header() {
        assert_eq!(parse_listing(LISTING), vec!["album/b.jpg".to_string(), "a.png".to_string()]);
    }

    #[test]
    fn test_parse_listing_without_entries() {
        assert!(parse_listing("Listing archive: empty.7z\n\n--\nPath = empty.7z\n").is_empty());
    }

    #[test]
    fn test_parse_listing_windows_line_endings() {
        let listing = LISTING.replace('\n', "\r\n");
        assert_eq!(parse_listing(&listing).len(), 2);
    }
}
