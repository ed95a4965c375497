//! Event sinks.
//!
//! Every node of a generation tree reports to its own [`Sink`]. Sinks are
//! called from job worker threads; [`ChannelSink`] moves the events onto a
//! [`Mailbox`] for whoever is waiting on them.

use crate::model::{ArchiveInfo, ImageData, ResourceInfo, ResourceStatus};
use mosaic_blob::BlobInfo;
use mosaic_jobs::Mailbox;
use mosaic_locator::ResourceLocator;
use std::sync::Arc;

/// Receiver of one node's events.
///
/// Exactly one of [`on_success`](Self::on_success) or
/// [`on_error`](Self::on_error) is called per node, last. A node that fans
/// out calls [`on_child_resource`](Self::on_child_resource) for every child
/// before its own terminal event.
pub trait Sink: Send + Sync {
    /// Sink for a child node about to be submitted.
    fn on_child_resource(&self, locator: &ResourceLocator) -> SinkHandle;

    fn on_blob_info(&self, _info: &BlobInfo) {}

    fn on_resource_info(&self, _info: &ResourceInfo) {}

    fn on_archive_data(&self, _info: &ArchiveInfo) {}

    fn on_image_data(&self, _data: &ImageData) {}

    fn on_success(&self, status: ResourceStatus);

    fn on_error(&self, status: ResourceStatus, message: &str);
}

pub type SinkHandle = Arc<dyn Sink>;

/// Sink event, tagged with the node it belongs to.
#[derive(Clone, Debug)]
pub struct GeneratorEvent {
    pub locator: ResourceLocator,
    pub kind: EventKind,
}

#[derive(Clone, Debug)]
pub enum EventKind {
    ChildResource(ResourceLocator),
    BlobInfo(BlobInfo),
    ResourceInfo(ResourceInfo),
    ArchiveData(ArchiveInfo),
    ImageData(ImageData),
    Success(ResourceStatus),
    Error(ResourceStatus, String),
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error(..))
    }
}

/// Posts every event of a tree to one mailbox.
pub struct ChannelSink {
    locator: ResourceLocator,
    mailbox: Mailbox<GeneratorEvent>,
}

impl ChannelSink {
    pub fn new(locator: ResourceLocator, mailbox: Mailbox<GeneratorEvent>) -> Self {
        Self { locator, mailbox }
    }

    fn post(&self, kind: EventKind) {
        self.mailbox.post(GeneratorEvent { locator: self.locator.clone(), kind });
    }
}

impl Sink for ChannelSink {
    fn on_child_resource(&self, locator: &ResourceLocator) -> SinkHandle {
        self.post(EventKind::ChildResource(locator.clone()));
        Arc::new(Self::new(locator.clone(), self.mailbox.clone()))
    }

    fn on_blob_info(&self, info: &BlobInfo) {
        self.post(EventKind::BlobInfo(*info));
    }

    fn on_resource_info(&self, info: &ResourceInfo) {
        self.post(EventKind::ResourceInfo(info.clone()));
    }

    fn on_archive_data(&self, info: &ArchiveInfo) {
        self.post(EventKind::ArchiveData(info.clone()));
    }

    fn on_image_data(&self, data: &ImageData) {
        self.post(EventKind::ImageData(data.clone()));
    }

    fn on_success(&self, status: ResourceStatus) {
        self.post(EventKind::Success(status));
    }

    fn on_error(&self, status: ResourceStatus, message: &str) {
        self.post(EventKind::Error(status, message.to_string()));
    }
}

/// Logs every event through `tracing`.
pub struct LogSink {
    locator: ResourceLocator,
}

impl LogSink {
    pub fn new(locator: ResourceLocator) -> Self {
        Self { locator }
    }
}

impl Sink for LogSink {
    fn on_child_resource(&self, locator: &ResourceLocator) -> SinkHandle {
        Arc::new(Self::new(locator.clone()))
    }

    fn on_blob_info(&self, info: &BlobInfo) {
        tracing::debug!(locator = %self.locator, digest = %info.digest, size = info.size, "resolved");
    }

    fn on_archive_data(&self, info: &ArchiveInfo) {
        tracing::info!(locator = %self.locator, format = ?info.format, members = info.members.len(), "archive");
    }

    fn on_image_data(&self, data: &ImageData) {
        tracing::info!(
            locator = %self.locator,
            file_id = %data.file.id,
            width = data.info.width,
            height = data.info.height,
            tiles = data.tiles.len(),
            "image"
        );
    }

    fn on_success(&self, _status: ResourceStatus) {
        tracing::debug!(locator = %self.locator, "done");
    }

    fn on_error(&self, status: ResourceStatus, message: &str) {
        tracing::warn!(locator = %self.locator, %status, error = message, "failed");
    }
}
