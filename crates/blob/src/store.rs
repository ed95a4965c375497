use crate::Digest;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Payloads keyed by digest, so equal content is held once.
///
/// Holds at most `budget` bytes of payloads that nobody else references.
/// Payloads still shared with a live [`Blob`](crate::Blob) are never evicted
/// and do not stop eviction of others.
#[derive(Debug)]
pub(crate) struct DigestStore {
    payloads: HashMap<Digest, Arc<[u8]>>,
    order: VecDeque<Digest>,
    bytes: u64,
    budget: u64,
}

impl DigestStore {
    pub(crate) fn new(budget: u64) -> Self {
        Self { payloads: HashMap::new(), order: VecDeque::new(), bytes: 0, budget }
    }

    pub(crate) fn get(&self, digest: &Digest) -> Option<Arc<[u8]>> {
        self.payloads.get(digest).cloned()
    }

    /// Return the canonical payload for `digest`, adopting `data` if none is
    /// held yet.
    pub(crate) fn intern(&mut self, digest: Digest, data: Vec<u8>) -> Arc<[u8]> {
        if let Some(existing) = self.payloads.get(&digest) {
            return Arc::clone(existing);
        }
        let payload: Arc<[u8]> = Arc::from(data);
        self.bytes += payload.len() as u64;
        self.payloads.insert(digest, Arc::clone(&payload));
        self.order.push_back(digest);
        self.evict();
        payload
    }

    fn evict(&mut self) {
        if self.bytes <= self.budget {
            return;
        }
        let mut kept = VecDeque::with_capacity(self.order.len());
        while let Some(digest) = self.order.pop_front() {
            let unreferenced = self.payloads.get(&digest).is_some_and(|payload| Arc::strong_count(payload) == 1);
            if self.bytes > self.budget && unreferenced {
                if let Some(payload) = self.payloads.remove(&digest) {
                    self.bytes -= payload.len() as u64;
                }
            } else {
                kept.push_back(digest);
            }
        }
        self.order = kept;
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn len(&self) -> usize {
        self.payloads.len()
    }
}
