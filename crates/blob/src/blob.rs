use crate::Digest;
use std::fmt;
use std::sync::Arc;

/// Identity of a blob's content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlobInfo {
    pub digest: Digest,
    pub size: u64,
}

/// Resolved bytes plus their digest. Cloning is cheap: every blob with the
/// same digest handed out by one manager shares one payload.
#[derive(Clone)]
pub struct Blob {
    info: BlobInfo,
    data: Arc<[u8]>,
}

impl Blob {
    pub(crate) fn new(digest: Digest, data: Arc<[u8]>) -> Self {
        Self { info: BlobInfo { digest, size: data.len() as u64 }, data }
    }

    pub fn info(&self) -> BlobInfo {
        self.info
    }

    pub fn digest(&self) -> Digest {
        self.info.digest
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether both blobs point at the same physical payload.
    pub fn shares_payload(&self, other: &Blob) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("digest", &self.info.digest).field("size", &self.info.size).finish()
    }
}
