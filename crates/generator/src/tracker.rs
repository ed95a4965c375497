use crate::model::{ArchiveInfo, ImageData, ResourceInfo, ResourceStatus};
use crate::sink::{Sink, SinkHandle};
use mosaic_blob::BlobInfo;
use mosaic_jobs::Mailbox;
use mosaic_locator::ResourceLocator;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct Counters {
    outstanding: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    idle: Mailbox<()>,
}

impl Counters {
    fn finish(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.post(());
        }
    }
}

/// Completion accounting for whole generation trees.
///
/// Each tracked root counts as one outstanding node; every child announced
/// through `on_child_resource` adds one, and every terminal event removes
/// one. When the count drops to zero the tracker is idle.
#[derive(Clone, Default)]
pub struct Tracker {
    counters: Arc<Counters>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `sink` so it, and every descendant, is counted.
    pub fn track(&self, sink: SinkHandle) -> SinkHandle {
        self.counters.outstanding.fetch_add(1, Ordering::AcqRel);
        Arc::new(TrackedSink { inner: sink, counters: Arc::clone(&self.counters) })
    }

    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::Acquire)
    }

    pub fn succeeded(&self) -> usize {
        self.counters.succeeded.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> usize {
        self.counters.failed.load(Ordering::Acquire)
    }

    /// Block until nothing is outstanding. Do not call from async code.
    pub fn wait_blocking(&self) {
        while self.outstanding() > 0 {
            self.counters.idle.recv_blocking();
        }
    }

    pub async fn wait(&self) {
        while self.outstanding() > 0 {
            self.counters.idle.recv().await;
        }
    }
}

struct TrackedSink {
    inner: SinkHandle,
    counters: Arc<Counters>,
}

impl Sink for TrackedSink {
    fn on_child_resource(&self, locator: &ResourceLocator) -> SinkHandle {
        self.counters.outstanding.fetch_add(1, Ordering::AcqRel);
        Arc::new(TrackedSink { inner: self.inner.on_child_resource(locator), counters: Arc::clone(&self.counters) })
    }

    fn on_blob_info(&self, info: &BlobInfo) {
        self.inner.on_blob_info(info);
    }

    fn on_resource_info(&self, info: &ResourceInfo) {
        self.inner.on_resource_info(info);
    }

    fn on_archive_data(&self, info: &ArchiveInfo) {
        self.inner.on_archive_data(info);
    }

    fn on_image_data(&self, data: &ImageData) {
        self.inner.on_image_data(data);
    }

    fn on_success(&self, status: ResourceStatus) {
        self.inner.on_success(status);
        self.counters.succeeded.fetch_add(1, Ordering::AcqRel);
        self.counters.finish();
    }

    fn on_error(&self, status: ResourceStatus, message: &str) {
        self.inner.on_error(status, message);
        self.counters.failed.fetch_add(1, Ordering::AcqRel);
        self.counters.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::LogSink;

    #[test]
    fn test_counts_tree() {
        let tracker = Tracker::new();
        assert_eq!(tracker.outstanding(), 0);
        tracker.wait_blocking();

        let root: ResourceLocator = "file:///a.zip".parse().unwrap();
        let sink = tracker.track(Arc::new(LogSink::new(root.clone())));
        let first = sink.on_child_resource(&root.child("b.jpg"));
        let second = sink.on_child_resource(&root.child("c.jpg"));
        sink.on_success(ResourceStatus::Success);
        assert_eq!(tracker.outstanding(), 2);

        let waiter = {
            let tracker = tracker.clone();
            std::thread::spawn(move || tracker.wait_blocking())
        };
        first.on_success(ResourceStatus::Success);
        second.on_error(ResourceStatus::DecodeError, "bad");
        waiter.join().unwrap();
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.succeeded(), 2);
        assert_eq!(tracker.failed(), 1);
    }

    #[tokio::test]
    async fn test_async_wait() {
        let tracker = Tracker::new();
        let sink = tracker.track(Arc::new(LogSink::new("file:///a.jpg".parse().unwrap())));
        std::thread::spawn(move || sink.on_success(ResourceStatus::Success));
        tracker.wait().await;
        assert_eq!(tracker.succeeded(), 1);
    }
}
