use mosaic_cache::{FileEntry, FileId, MemoryTileDatabase, TileDatabase, TileEntry, TilePos};
use mosaic_generator::{Generator, ImageData, ResourceStatus, Sink, SinkHandle};
use mosaic_jobs::{JobHandle, JobManager, Mailbox, Priority};
use mosaic_locator::ResourceLocator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;

/// Answer to a tile request.
#[derive(Clone, Debug)]
pub enum TileReply {
    Ready(TileEntry),
    /// Nothing could produce the tile.
    Missing { file_id: FileId, scale: u32, pos: TilePos },
}

/// Asynchronous tile lookup. Replies are posted to `reply`, never delivered
/// by calling back into the requester.
pub trait TileSource: Send + Sync {
    fn request(&self, file: &FileEntry, scale: u32, pos: TilePos, reply: Mailbox<TileReply>) -> JobHandle;
}

pub type TileSourceHandle = Arc<dyn TileSource>;

/// Looks in the staged tiles first, then the database. With a generator
/// attached, a tile found in neither is regenerated from the file's url.
#[derive(Clone)]
pub struct CacheTileSource {
    jobs: JobManager,
    stage: Arc<MemoryTileDatabase>,
    db: TileDatabase,
    runtime: Handle,
    generator: Option<Generator>,
}

impl CacheTileSource {
    /// `runtime` drives the database reads made from job worker threads.
    pub fn new(jobs: JobManager, stage: Arc<MemoryTileDatabase>, db: TileDatabase, runtime: Handle) -> Self {
        Self { jobs, stage, db, runtime, generator: None }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    fn lookup(&self, file_id: FileId, scale: u32, pos: TilePos) -> mosaic_cache::Result<Option<TileEntry>> {
        if let Some(tile) = self.stage.get_tile(file_id, scale, pos) {
            return Ok(Some(tile));
        }
        self.runtime.block_on(self.db.get_tile(file_id, scale, pos))
    }

    fn regenerate(&self, generator: &Generator, file: &FileEntry, scale: u32, pos: TilePos, reply: Mailbox<TileReply>) {
        let missing = TileReply::Missing { file_id: file.id, scale, pos };
        let locator = match file.url.parse::<ResourceLocator>() {
            Ok(locator) => locator,
            Err(err) => {
                tracing::warn!(url = %file.url, error = ?err, "stored url is not a locator");
                reply.post(missing);
                return;
            },
        };
        tracing::debug!(%locator, scale, %pos, "regenerating");
        let sink = Arc::new(ReplySink { scale, pos, reply, replied: Arc::new(AtomicBool::new(false)), missing });
        generator.request_with_priority(Priority::High, locator, sink);
    }
}

impl TileSource for CacheTileSource {
    fn request(&self, file: &FileEntry, scale: u32, pos: TilePos, reply: Mailbox<TileReply>) -> JobHandle {
        let source = self.clone();
        let file = file.clone();
        self.jobs.submit(Priority::High, move |ctx| {
            if ctx.is_aborted() {
                return;
            }
            match source.lookup(file.id, scale, pos) {
                Ok(Some(tile)) => reply.post(TileReply::Ready(tile)),
                Ok(None) => match &source.generator {
                    Some(generator) => source.regenerate(generator, &file, scale, pos, reply),
                    None => reply.post(TileReply::Missing { file_id: file.id, scale, pos }),
                },
                Err(err) => {
                    tracing::warn!(file_id = %file.id, scale, %pos, error = ?err, "tile lookup failed");
                    reply.post(TileReply::Missing { file_id: file.id, scale, pos });
                },
            }
        })
    }
}

/// Picks the requested tile out of a regenerated pyramid. Exactly one reply
/// is posted however the generation ends.
struct ReplySink {
    scale: u32,
    pos: TilePos,
    reply: Mailbox<TileReply>,
    replied: Arc<AtomicBool>,
    missing: TileReply,
}

impl ReplySink {
    fn post_once(&self, reply: TileReply) {
        if !self.replied.swap(true, Ordering::AcqRel) {
            self.reply.post(reply);
        }
    }
}

impl Sink for ReplySink {
    fn on_child_resource(&self, _locator: &ResourceLocator) -> SinkHandle {
        // A file entry names an image, which has no children.
        Arc::new(Self {
            scale: self.scale,
            pos: self.pos,
            reply: self.reply.clone(),
            replied: Arc::clone(&self.replied),
            missing: self.missing.clone(),
        })
    }

    fn on_image_data(&self, data: &ImageData) {
        if let Some(tile) = data.tiles.iter().find(|tile| tile.scale == self.scale && tile.pos == self.pos) {
            self.post_once(TileReply::Ready(tile.clone()));
        }
    }

    fn on_success(&self, _status: ResourceStatus) {
        self.post_once(self.missing.clone());
    }

    fn on_error(&self, _status: ResourceStatus, _message: &str) {
        self.post_once(self.missing.clone());
    }
}
