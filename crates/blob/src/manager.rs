use crate::error::{ErrorKind, Result};
use crate::fetch::FetcherHandle;
use crate::store::DigestStore;
use crate::{Backoff, Blob, BlobInfo, Digest};
use exn::ResultExt;
use mosaic_archive::{ArchiveFormat, ArchiveManager, ArchiveSource};
use mosaic_locator::{ResourceLocator, Scheme};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use time::UtcDateTime;
use tracing::instrument;

/// Default byte budget for unreferenced payloads kept around for reuse.
pub const DEFAULT_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// What a locator names once opened.
#[derive(Clone, Debug)]
pub enum Resource {
    /// A local directory; it has no bytes of its own.
    Directory(PathBuf),
    Blob(Blob),
}

/// Session cache key. A local source edited on disk gets a new key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SessionKey {
    locator: ResourceLocator,
    mtime: Option<SystemTime>,
}

/// Resolves locators to bytes.
///
/// Nested locators are read out of their parent's bytes, so resolving
/// `file:///a.zip!b.tar!c.jpg` opens `a.zip`, reads `b.tar` from it and then
/// `c.jpg` from that. Resolved blobs are remembered per locator for the
/// lifetime of the manager, and blobs with equal digests share one payload.
pub struct BlobManager {
    archives: ArchiveManager,
    fetcher: Option<FetcherHandle>,
    backoff: Backoff,
    sessions: Mutex<HashMap<SessionKey, BlobInfo>>,
    store: Mutex<DigestStore>,
}

impl Default for BlobManager {
    fn default() -> Self {
        Self::new(ArchiveManager::default())
    }
}

impl BlobManager {
    /// A manager for local sources only. Network locators fail with
    /// [`UnsupportedScheme`](ErrorKind::UnsupportedScheme) until a fetcher
    /// is attached.
    pub fn new(archives: ArchiveManager) -> Self {
        Self {
            archives,
            fetcher: None,
            backoff: Backoff::default(),
            sessions: Mutex::new(HashMap::new()),
            store: Mutex::new(DigestStore::new(DEFAULT_CACHE_BYTES)),
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: FetcherHandle) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_budget(self, bytes: u64) -> Self {
        *self.store.lock() = DigestStore::new(bytes);
        self
    }

    pub fn archives(&self) -> &ArchiveManager {
        &self.archives
    }

    /// Modification time of the local file the locator bottoms out in.
    pub fn modified(&self, locator: &ResourceLocator) -> Option<UtcDateTime> {
        Self::mtime(locator).map(UtcDateTime::from)
    }

    fn mtime(locator: &ResourceLocator) -> Option<SystemTime> {
        let path = locator.local_path()?;
        fs::metadata(path).and_then(|metadata| metadata.modified()).ok()
    }

    /// Open whatever the locator names. Local directories are returned as
    /// such; everything else is resolved to a blob.
    pub fn open(&self, locator: &ResourceLocator) -> Result<Resource> {
        if !locator.is_nested()
            && let Some(path) = locator.local_path()
            && path.is_dir()
        {
            return Ok(Resource::Directory(path));
        }
        self.resolve(locator).map(Resource::Blob)
    }

    /// Resolve the locator to its bytes.
    #[instrument(level = "debug", skip(self), fields(locator = %locator, digest))]
    pub fn resolve(&self, locator: &ResourceLocator) -> Result<Blob> {
        let key = SessionKey { locator: locator.clone(), mtime: Self::mtime(locator) };
        let remembered = self.sessions.lock().get(&key).copied();
        if let Some(info) = remembered
            && let Some(data) = self.store.lock().get(&info.digest)
        {
            tracing::Span::current().record("digest", tracing::field::display(info.digest));
            return Ok(Blob::new(info.digest, data));
        }

        let bytes = self.load(locator)?;
        let digest = Digest::of(&bytes);
        tracing::Span::current().record("digest", tracing::field::display(digest));
        let data = self.store.lock().intern(digest, bytes);
        let blob = Blob::new(digest, data);
        self.sessions.lock().insert(key, blob.info());
        Ok(blob)
    }

    /// Bytes held by the payload store.
    pub fn cached_bytes(&self) -> u64 {
        self.store.lock().bytes()
    }

    /// Distinct payloads held by the payload store.
    pub fn cached_blobs(&self) -> usize {
        self.store.lock().len()
    }

    fn load(&self, locator: &ResourceLocator) -> Result<Vec<u8>> {
        if let Some(parent) = locator.parent() {
            let member = locator.last_segment();
            let source = match self.open(&parent)? {
                Resource::Directory(dir) => {
                    return ArchiveFormat::Directory
                        .read_member(&ArchiveSource::Path(dir), member)
                        .or_raise(|| ErrorKind::Archive);
                },
                Resource::Blob(blob) => ArchiveSource::from(Arc::clone(blob.data())),
            };
            return self.archives.read_member(&source, parent.file_name(), member).or_raise(|| ErrorKind::Archive);
        }
        match locator.scheme() {
            Scheme::File => Self::read_local(Path::new(locator.path())),
            scheme => {
                let Some(fetcher) = &self.fetcher else {
                    exn::bail!(ErrorKind::UnsupportedScheme(scheme.to_string()));
                };
                let url = locator.url();
                self.backoff.retry(|| fetcher.fetch(&url))
            },
        }
    }

    fn read_local(path: &Path) -> Result<Vec<u8>> {
        if path.is_dir() {
            exn::bail!(ErrorKind::IsDirectory(path.display().to_string()));
        }
        Ok(fs::read(path).map_err(|e| map_io_error(e, path))?)
    }
}

fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockFetcher;
    use std::io::{Cursor, Write};
    use std::time::Duration;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn quick_backoff() -> Backoff {
        Backoff { retries: 3, base: Duration::from_millis(1), max: Duration::from_millis(2) }
    }

    fn locator(path: &Path) -> ResourceLocator {
        ResourceLocator::from_path(path).unwrap()
    }

    #[test]
    fn test_resolve_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"jpeg").unwrap();
        let blob = BlobManager::default().resolve(&locator(&path)).unwrap();
        assert_eq!(blob.bytes(), b"jpeg");
        assert_eq!(blob.size(), 4);
        assert_eq!(blob.digest(), Digest::of(b"jpeg"));
    }

    #[test]
    fn test_equal_content_shares_payload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"same").unwrap();
        fs::write(dir.path().join("b.jpg"), b"same").unwrap();
        let manager = BlobManager::default();
        let a = manager.resolve(&locator(&dir.path().join("a.jpg"))).unwrap();
        let b = manager.resolve(&locator(&dir.path().join("b.jpg"))).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert!(a.shares_payload(&b));
        assert_eq!(manager.cached_blobs(), 1);
    }

    #[test]
    fn test_resolve_nested_members() {
        let inner = zip_bytes(&[("c.jpg", b"inner jpeg")]);
        let outer = zip_bytes(&[("b.zip", &inner), ("d.jpg", b"outer jpeg")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.zip");
        fs::write(&path, outer).unwrap();
        let manager = BlobManager::default();
        let top = locator(&path);
        let blob = manager.resolve(&top.child("b.zip").child("c.jpg")).unwrap();
        assert_eq!(blob.bytes(), b"inner jpeg");
        assert_eq!(manager.resolve(&top.child("d.jpg")).unwrap().bytes(), b"outer jpeg");
        let err = manager.resolve(&top.child("missing.jpg")).unwrap_err();
        assert_eq!(*err, ErrorKind::Archive);
    }

    #[test]
    fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.jpg"), b"a").unwrap();
        let manager = BlobManager::default();
        let top = locator(dir.path());
        assert!(matches!(manager.open(&top).unwrap(), Resource::Directory(path) if path == dir.path()));
        let Resource::Blob(blob) = manager.open(&top.child("sub/a.jpg")).unwrap() else {
            panic!("expected a blob");
        };
        assert_eq!(blob.bytes(), b"a");
        let err = manager.resolve(&top).unwrap_err();
        assert!(matches!(*err, ErrorKind::IsDirectory(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.jpg");
        let err = BlobManager::default().resolve(&locator(&path)).unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(path.display().to_string()));
    }

    #[test]
    fn test_network_without_fetcher() {
        let url: ResourceLocator = "https://example.com/a.jpg".parse().unwrap();
        let err = BlobManager::default().resolve(&url).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedScheme("https".to_string()));
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let fetcher = Arc::new(MockFetcher::new().with_response("http://host/a.jpg", b"remote".to_vec()));
        fetcher.fail_next("http://host/a.jpg", ErrorKind::Status(503));
        fetcher.fail_next("http://host/a.jpg", ErrorKind::Network("reset".to_string()));
        let manager = BlobManager::default().with_fetcher(fetcher.clone()).with_backoff(quick_backoff());
        let blob = manager.resolve(&"http://host/a.jpg".parse().unwrap()).unwrap();
        assert_eq!(blob.bytes(), b"remote");
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[test]
    fn test_retries_exhausted() {
        let fetcher = Arc::new(MockFetcher::new().with_response("http://host/a.jpg", b"remote".to_vec()));
        for _ in 0..4 {
            fetcher.fail_next("http://host/a.jpg", ErrorKind::Status(500));
        }
        let manager = BlobManager::default().with_fetcher(fetcher.clone()).with_backoff(quick_backoff());
        let err = manager.resolve(&"http://host/a.jpg".parse().unwrap()).unwrap_err();
        assert_eq!(*err, ErrorKind::RetriesExhausted(4));
        assert_eq!(fetcher.calls().len(), 4);
    }

    #[test]
    fn test_not_found_is_not_retried() {
        let fetcher = Arc::new(MockFetcher::new());
        let manager = BlobManager::default().with_fetcher(fetcher.clone()).with_backoff(quick_backoff());
        let err = manager.resolve(&"http://host/gone.jpg".parse().unwrap()).unwrap_err();
        assert_eq!(*err, ErrorKind::Status(404));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[test]
    fn test_session_cache_avoids_refetch() {
        let fetcher = Arc::new(MockFetcher::new().with_response("http://host/a.zip", zip_bytes(&[("b.jpg", b"b")])));
        let manager = BlobManager::default().with_fetcher(fetcher.clone());
        let top: ResourceLocator = "http://host/a.zip".parse().unwrap();
        manager.resolve(&top).unwrap();
        manager.resolve(&top.child("b.jpg")).unwrap();
        manager.resolve(&top.child("b.jpg")).unwrap();
        assert_eq!(fetcher.calls(), vec!["http://host/a.zip".to_string()]);
    }

    #[test]
    fn test_unreferenced_payloads_are_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BlobManager::default().with_budget(8);
        for name in ["a", "b", "c"] {
            let path = dir.path().join(name);
            fs::write(&path, name.repeat(4)).unwrap();
            drop(manager.resolve(&locator(&path)).unwrap());
        }
        assert!(manager.cached_bytes() <= 8);
        // Evicted entries are simply loaded again.
        assert_eq!(manager.resolve(&locator(&dir.path().join("a"))).unwrap().bytes(), b"aaaa");
    }
}
