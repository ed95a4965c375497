use crate::codec::{Codec, ImageCodec};
use crate::error::{Error, ErrorKind, Result};
use crate::model::{ArchiveInfo, ImageData, ImageInfo, Mode, ResourceInfo, ResourceKind, ResourceStatus, Settings};
use crate::sink::{Sink, SinkHandle};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use mosaic_archive::{ArchiveFormat, ArchiveSource};
use mosaic_blob::{Blob, BlobManager, Resource};
use mosaic_cache::pyramid::{self, TILE_SIZE};
use mosaic_cache::{FileEntry, NewFileEntry, TileEntry, TileFormat, TilePos, TileWriterHandle};
use mosaic_jobs::{JobContext, JobHandle, JobManager, JobStatus, Priority};
use mosaic_locator::ResourceLocator;
use std::borrow::Cow;
use std::ops::RangeInclusive;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::instrument;

/// How a node's job ended without error.
enum Outcome {
    /// The node is finished; report success.
    Done,
    /// A continuation job took over the node and reports its outcome.
    Continued,
}

/// Recursive resource processor.
///
/// Every node of a request runs as its own job: it resolves its bytes,
/// classifies them and then either fans out into one child job per archive
/// member or cuts an image into a tile pyramid. Events go to the node's
/// sink; failures stay with the node that hit them.
#[derive(Clone)]
pub struct Generator {
    jobs: JobManager,
    blobs: Arc<BlobManager>,
    codec: Arc<dyn Codec>,
    writer: TileWriterHandle,
    settings: Settings,
}

impl Generator {
    pub fn new(jobs: JobManager, blobs: Arc<BlobManager>, writer: TileWriterHandle, settings: Settings) -> Self {
        Self { jobs, blobs, codec: Arc::new(ImageCodec), writer, settings }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Process `locator` and everything inside it at normal priority.
    ///
    /// Aborting the returned handle before the job starts guarantees the sink
    /// hears nothing. Child nodes are independent jobs and are not affected.
    pub fn request(&self, locator: ResourceLocator, sink: SinkHandle) -> JobHandle {
        self.request_with_priority(Priority::Normal, locator, sink)
    }

    pub fn request_with_priority(&self, priority: Priority, locator: ResourceLocator, sink: SinkHandle) -> JobHandle {
        self.submit(priority, locator, sink)
    }

    fn submit(&self, priority: Priority, locator: ResourceLocator, sink: SinkHandle) -> JobHandle {
        let generator = self.clone();
        let fallback = Arc::clone(&sink);
        let handle = self.jobs.submit(priority, move |ctx| generator.run_node(ctx, &locator, &sink));
        if handle.status() == JobStatus::Dropped {
            fallback.on_error(ResourceStatus::Cancelled, "job manager is stopping");
        }
        handle
    }

    fn run_node(&self, ctx: &JobContext, locator: &ResourceLocator, sink: &SinkHandle) {
        match guarded(|| self.process(ctx, locator, sink)) {
            Ok(Outcome::Done) => sink.on_success(ResourceStatus::Success),
            Ok(Outcome::Continued) => {},
            Err(err) => report(locator, sink.as_ref(), &err),
        }
    }

    #[instrument(level = "debug", skip_all, fields(locator = %locator))]
    fn process(&self, ctx: &JobContext, locator: &ResourceLocator, sink: &SinkHandle) -> Result<Outcome> {
        if ctx.is_aborted() {
            exn::bail!(ErrorKind::Cancelled);
        }
        let blob = match self.blobs.open(locator).map_err(ErrorKind::fetch)? {
            Resource::Directory(path) => {
                sink.on_resource_info(&ResourceInfo { locator: locator.clone(), kind: ResourceKind::Archive, blob: None });
                let members =
                    ArchiveFormat::Directory.list_members(&ArchiveSource::Path(path)).map_err(ErrorKind::archive)?;
                self.fan_out(locator, sink, ArchiveInfo { format: ArchiveFormat::Directory, members });
                return Ok(Outcome::Done);
            },
            Resource::Blob(blob) => blob,
        };
        sink.on_blob_info(&blob.info());

        // Content decides first; the name is only a tie-breaker for bytes
        // nothing recognises.
        let archives = self.blobs.archives();
        let name = locator.file_name();
        if let Some(format) = archives.select_by_prefix(blob.bytes(), None) {
            return self.expand(locator, sink, &blob, format);
        }
        if self.codec.sniff(blob.bytes(), None) {
            return self.render(ctx, locator, sink, &blob);
        }
        if let Some(format) = archives.select_by_prefix(blob.bytes(), name) {
            return self.expand(locator, sink, &blob, format);
        }
        if self.codec.sniff(blob.bytes(), name) {
            return self.render(ctx, locator, sink, &blob);
        }
        exn::bail!(ErrorKind::UnsupportedFormat(locator.to_string()))
    }

    fn expand(&self, locator: &ResourceLocator, sink: &SinkHandle, blob: &Blob, format: ArchiveFormat) -> Result<Outcome> {
        sink.on_resource_info(&ResourceInfo {
            locator: locator.clone(),
            kind: ResourceKind::Archive,
            blob: Some(blob.info()),
        });
        let members =
            format.list_members(&ArchiveSource::Bytes(Arc::clone(blob.data()))).map_err(ErrorKind::archive)?;
        self.fan_out(locator, sink, ArchiveInfo { format, members });
        Ok(Outcome::Done)
    }

    /// Children are announced to the sink before they are submitted, so a
    /// counting sink never sees the tree drain early.
    fn fan_out(&self, locator: &ResourceLocator, sink: &SinkHandle, info: ArchiveInfo) {
        sink.on_archive_data(&info);
        tracing::debug!(%locator, format = ?info.format, members = info.members.len(), "fanning out");
        for member in info.members {
            let child = locator.child(member);
            let child_sink = sink.on_child_resource(&child);
            self.submit(Priority::Normal, child, child_sink);
        }
    }

    fn render(&self, ctx: &JobContext, locator: &ResourceLocator, sink: &SinkHandle, blob: &Blob) -> Result<Outcome> {
        let image = self.codec.decode(blob.bytes())?;
        let (width, height) = image.dimensions();
        let format = if image.color().has_alpha() { TileFormat::Png } else { TileFormat::Jpeg };
        let info = ImageInfo { width, height, max_scale: pyramid::max_scale(width, height), format };
        sink.on_resource_info(&ResourceInfo { locator: locator.clone(), kind: ResourceKind::Image, blob: Some(blob.info()) });

        let file = self
            .writer
            .register(NewFileEntry {
                url: locator.to_string(),
                size: blob.size(),
                mtime: self.blobs.modified(locator),
                width,
                height,
                format,
            })
            .map_err(ErrorKind::persistence)?;

        let quick_lowest = (info.max_scale + 1).saturating_sub(self.settings.quick_levels.max(1));
        let mut tiles = self.cut(&|| ctx.is_aborted(), &file, &image, quick_lowest..=info.max_scale)?;
        if self.settings.mode == Mode::Quick || quick_lowest == 0 {
            sink.on_image_data(&ImageData { info, file, tiles });
            return Ok(Outcome::Done);
        }

        // Aborting the request also stops the finer levels still to come.
        let request = ctx.signal();
        let generator = self.clone();
        let owner = locator.clone();
        let continuation = Arc::clone(sink);
        let handle = self.jobs.submit(Priority::Low, move |ctx| {
            let aborted = || ctx.is_aborted() || request.is_aborted();
            match guarded(|| generator.cut(&aborted, &file, &image, 0..=quick_lowest - 1)) {
                Ok(mut finer) => {
                    finer.append(&mut tiles);
                    continuation.on_image_data(&ImageData { info, file, tiles: finer });
                    continuation.on_success(ResourceStatus::Success);
                },
                Err(err) => report(&owner, continuation.as_ref(), &err),
            }
        });
        if handle.status() == JobStatus::Dropped {
            sink.on_error(ResourceStatus::Cancelled, "job manager is stopping");
        }
        Ok(Outcome::Continued)
    }

    /// Cut and write every tile of `levels`, finest level first. Each level
    /// is downsampled from the one before it.
    fn cut(
        &self,
        aborted: &dyn Fn() -> bool,
        file: &FileEntry,
        image: &DynamicImage,
        levels: RangeInclusive<u32>,
    ) -> Result<Vec<TileEntry>> {
        let (width, height) = image.dimensions();
        let mut tiles = Vec::new();
        let mut level: Cow<'_, DynamicImage> = Cow::Borrowed(image);
        let mut level_scale = 0;
        for scale in levels {
            if scale != level_scale {
                let resized =
                    level.resize_exact(pyramid::scaled(width, scale), pyramid::scaled(height, scale), FilterType::Triangle);
                level = Cow::Owned(resized);
                level_scale = scale;
            }
            self.cut_level(aborted, file, &level, scale, &mut tiles)?;
        }
        Ok(tiles)
    }

    fn cut_level(
        &self,
        aborted: &dyn Fn() -> bool,
        file: &FileEntry,
        level: &DynamicImage,
        scale: u32,
        tiles: &mut Vec<TileEntry>,
    ) -> Result<()> {
        let (width, height) = level.dimensions();
        for y in 0..height.div_ceil(TILE_SIZE) {
            for x in 0..width.div_ceil(TILE_SIZE) {
                if aborted() {
                    exn::bail!(ErrorKind::Cancelled);
                }
                let (left, top) = (x * TILE_SIZE, y * TILE_SIZE);
                let piece = level.crop_imm(left, top, TILE_SIZE.min(width - left), TILE_SIZE.min(height - top));
                let payload = self.codec.encode(&piece, file.format, self.settings.jpeg_quality)?;
                let tile = TileEntry::new(file.id, scale, TilePos::new(x, y), file.format, payload);
                tracing::trace!(file_id = %file.id, scale, x, y, bytes = tile.payload.len(), "tile");
                self.writer.write(tile.clone()).map_err(ErrorKind::persistence)?;
                tiles.push(tile);
            }
        }
        Ok(())
    }
}

/// Run `work`, turning a panic into an error so the node still reports an
/// outcome to its sink.
fn guarded<T>(work: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(exn::Exn::from(ErrorKind::Panicked(message)))
    })
}

fn report(locator: &ResourceLocator, sink: &dyn Sink, err: &Error) {
    let kind: &ErrorKind = err;
    tracing::warn!(%locator, error = %kind, "resource failed");
    sink.on_error(ResourceStatus::from(kind), &kind.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, EventKind, GeneratorEvent};
    use crate::tracker::Tracker;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use mosaic_blob::Digest;
    use mosaic_cache::{FileId, MemoryTileDatabase, TileWriter};
    use mosaic_jobs::{Mailbox, QueuePolicy};
    use parking_lot::Mutex;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Hands out ids in order and keeps tiles in memory. `on_write` runs
    /// once, on the first tile.
    #[derive(Default)]
    struct RecordingWriter {
        next_id: AtomicI64,
        entries: Mutex<Vec<FileEntry>>,
        tiles: MemoryTileDatabase,
        on_write: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl TileWriter for RecordingWriter {
        fn register(&self, entry: NewFileEntry) -> mosaic_cache::Result<FileEntry> {
            let id = FileId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
            let entry = FileEntry {
                id,
                url: entry.url,
                size: entry.size,
                mtime: entry.mtime,
                width: entry.width,
                height: entry.height,
                format: entry.format,
            };
            self.entries.lock().push(entry.clone());
            Ok(entry)
        }

        fn write(&self, tile: TileEntry) -> mosaic_cache::Result<()> {
            let hook = self.on_write.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.tiles.store_tile(tile);
            Ok(())
        }
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50])));
        ImageCodec.encode(&image, TileFormat::Jpeg, 80).unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 100])));
        ImageCodec.encode(&image, TileFormat::Png, 80).unwrap()
    }

    fn zip(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    struct PanickingCodec;

    impl Codec for PanickingCodec {
        fn sniff(&self, bytes: &[u8], name: Option<&str>) -> bool {
            ImageCodec.sniff(bytes, name)
        }

        fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage> {
            panic!("decoder blew up")
        }

        fn encode(&self, image: &DynamicImage, format: TileFormat, quality: u8) -> Result<Vec<u8>> {
            ImageCodec.encode(image, format, quality)
        }
    }

    struct Fixture {
        generator: Generator,
        writer: Arc<RecordingWriter>,
        tracker: Tracker,
        events: Mailbox<GeneratorEvent>,
    }

    impl Fixture {
        fn new(workers: usize, settings: Settings) -> Self {
            let jobs = JobManager::new(workers, QueuePolicy::Fifo).unwrap();
            let writer = Arc::new(RecordingWriter::default());
            let generator = Generator::new(jobs, Arc::new(BlobManager::default()), writer.clone(), settings);
            Self { generator, writer, tracker: Tracker::new(), events: Mailbox::new() }
        }

        fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
            self.generator = self.generator.clone().with_codec(codec);
            self
        }

        fn run(&self, locator: &ResourceLocator) -> Vec<GeneratorEvent> {
            let sink = self.tracker.track(Arc::new(ChannelSink::new(locator.clone(), self.events.clone())));
            self.generator.request(locator.clone(), sink);
            self.tracker.wait_blocking();
            self.events.drain()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.generator.jobs().shutdown();
        }
    }

    fn terminal(events: &[GeneratorEvent]) -> (Vec<&ResourceLocator>, Vec<(&ResourceLocator, ResourceStatus)>) {
        let mut successes = Vec::new();
        let mut errors = Vec::new();
        for event in events {
            match &event.kind {
                EventKind::Success(_) => successes.push(&event.locator),
                EventKind::Error(status, _) => errors.push((&event.locator, *status)),
                _ => {},
            }
        }
        (successes, errors)
    }

    #[test]
    fn test_archive_with_one_bad_member() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip(&[
            ("b.jpg", jpeg(600, 300)),
            ("c.png", png(40, 30)),
            ("notes.txt", b"plain text notes".to_vec()),
            ("broken.jpg", b"\xFF\xD8\xFF\xE0 truncated".to_vec()),
        ]);
        std::fs::write(dir.path().join("a.zip"), &bytes).unwrap();
        let root = ResourceLocator::from_path(dir.path().join("a.zip")).unwrap();

        let fixture = Fixture::new(3, Settings::default());
        let events = fixture.run(&root);

        let (successes, errors) = terminal(&events);
        assert_eq!(successes.len(), 3);
        assert!(successes.contains(&&root));
        let mut errors: Vec<_> = errors.into_iter().map(|(l, s)| (l.to_string(), s)).collect();
        errors.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            errors,
            vec![
                (root.child("broken.jpg").to_string(), ResourceStatus::DecodeError),
                (root.child("notes.txt").to_string(), ResourceStatus::UnsupportedFormat),
            ]
        );

        let root_blob = events.iter().find_map(|event| match &event.kind {
            EventKind::BlobInfo(info) if event.locator == root => Some(*info),
            _ => None,
        });
        assert_eq!(root_blob.unwrap().digest, Digest::of(&bytes));

        let members = events.iter().find_map(|event| match &event.kind {
            EventKind::ArchiveData(info) => Some(info.members.clone()),
            _ => None,
        });
        assert_eq!(members.unwrap(), vec!["b.jpg", "c.png", "notes.txt", "broken.jpg"]);

        let image = events
            .iter()
            .find_map(|event| match &event.kind {
                EventKind::ImageData(data) if event.locator == root.child("b.jpg") => Some(data.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!((image.info.width, image.info.height, image.info.max_scale), (600, 300, 2));
        assert_eq!(image.info.format, TileFormat::Jpeg);
        assert_eq!(image.tiles.len() as u64, pyramid::total_tiles(600, 300));
        assert_eq!(image.tiles.len(), 9);

        let png_entry = fixture.writer.entries.lock().iter().find(|e| e.url.ends_with("c.png")).cloned().unwrap();
        assert_eq!(png_entry.format, TileFormat::Png);
        assert_eq!(fixture.writer.tiles.get_tiles(png_entry.id).len(), 1);
        assert_eq!(fixture.writer.tiles.len(), 10);
    }

    #[test]
    fn test_full_mode_continues_at_low_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg(600, 300)).unwrap();
        let locator = ResourceLocator::from_path(dir.path().join("b.jpg")).unwrap();

        let fixture = Fixture::new(1, Settings { mode: Mode::Full, quick_levels: 1, ..Settings::default() });
        let events = fixture.run(&locator);

        let data: Vec<&ImageData> = events
            .iter()
            .filter_map(|event| match &event.kind {
                EventKind::ImageData(data) => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].tiles.len(), 9);
        // Finest first, the quick level last.
        assert_eq!(data[0].tiles.first().unwrap().scale, 0);
        assert_eq!(data[0].tiles.last().unwrap().scale, 2);
        assert!(matches!(events.last().unwrap().kind, EventKind::Success(ResourceStatus::Success)));
    }

    #[test]
    fn test_quick_mode_stops_at_coarse_levels() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg(600, 300)).unwrap();
        let locator = ResourceLocator::from_path(dir.path().join("b.jpg")).unwrap();

        let fixture = Fixture::new(1, Settings { mode: Mode::Quick, quick_levels: 1, ..Settings::default() });
        fixture.run(&locator);

        let entry = fixture.writer.entries.lock()[0].clone();
        assert_eq!(fixture.writer.tiles.get_min_max_scale(entry.id), Some((2, 2)));
        assert_eq!(fixture.writer.tiles.len(), 1);
        assert!(entry.mtime.is_some());
    }

    #[test]
    fn test_directory_resource() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.png"), png(10, 10)).unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg(20, 10)).unwrap();
        let root = ResourceLocator::from_path(dir.path()).unwrap();

        let fixture = Fixture::new(2, Settings::default());
        let events = fixture.run(&root);

        let (successes, errors) = terminal(&events);
        assert!(errors.is_empty());
        assert_eq!(successes.len(), 3);
        assert!(events.iter().any(|event| matches!(
            &event.kind,
            EventKind::ResourceInfo(info) if info.kind == ResourceKind::Archive && info.blob.is_none()
        )));
        assert_eq!(fixture.tracker.succeeded(), 3);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ResourceLocator::from_path(dir.path().join("missing.jpg")).unwrap();
        let fixture = Fixture::new(1, Settings::default());
        let events = fixture.run(&locator);
        assert!(matches!(&events[..], [GeneratorEvent { kind: EventKind::Error(ResourceStatus::BlobFetchError, _), .. }]));
        assert_eq!(fixture.tracker.failed(), 1);
    }

    #[test]
    fn test_abort_before_start_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg(20, 20)).unwrap();
        let locator = ResourceLocator::from_path(dir.path().join("b.jpg")).unwrap();
        let fixture = Fixture::new(1, Settings::default());

        // Hold the only worker so the request stays queued.
        let gate = Mailbox::<()>::new();
        let blocker = {
            let gate = gate.clone();
            fixture.generator.jobs().submit(Priority::High, move |_| {
                gate.recv_blocking();
            })
        };
        let sink: SinkHandle = Arc::new(ChannelSink::new(locator.clone(), fixture.events.clone()));
        let handle = fixture.generator.request(locator, sink);
        handle.abort();
        gate.post(());
        blocker.wait();

        assert_eq!(handle.wait(), JobStatus::Aborted);
        assert!(fixture.events.is_empty());
        assert!(fixture.writer.entries.lock().is_empty());
    }

    #[test]
    fn test_stopped_manager_reports_cancelled() {
        let fixture = Fixture::new(1, Settings::default());
        fixture.generator.jobs().stop();
        let locator: ResourceLocator = "file:///nowhere/a.jpg".parse().unwrap();
        let events = fixture.run(&locator);
        assert!(matches!(&events[..], [GeneratorEvent { kind: EventKind::Error(ResourceStatus::Cancelled, _), .. }]));
    }

    #[test]
    fn test_nested_archive_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let inner = zip(&[("d.png", png(300, 20))]);
        let bytes = zip(&[("b.jpg", jpeg(40, 40)), ("inner.zip", inner)]);
        std::fs::write(dir.path().join("a.zip"), &bytes).unwrap();
        let root = ResourceLocator::from_path(dir.path().join("a.zip")).unwrap();
        let b = root.child("b.jpg");
        let d = root.child("inner.zip").child("d.png");
        assert!(b.to_string().ends_with("/a.zip!b.jpg"));
        assert!(d.to_string().ends_with("/a.zip!inner.zip!d.png"));

        let fixture = Fixture::new(2, Settings::default());
        let events = fixture.run(&root);

        let (successes, errors) = terminal(&events);
        assert!(errors.is_empty());
        let mut successes: Vec<String> = successes.into_iter().map(ToString::to_string).collect();
        successes.sort();
        let mut expected = vec![root.to_string(), b.to_string(), root.child("inner.zip").to_string(), d.to_string()];
        expected.sort();
        assert_eq!(successes, expected);

        let inner_members = events.iter().find_map(|event| match &event.kind {
            EventKind::ArchiveData(info) if event.locator == root.child("inner.zip") => Some(info.members.clone()),
            _ => None,
        });
        assert_eq!(inner_members.unwrap(), vec!["d.png"]);

        let tiles_for = |locator: &ResourceLocator| {
            events
                .iter()
                .find_map(|event| match &event.kind {
                    EventKind::ImageData(data) if &event.locator == locator => Some(data.tiles.len()),
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(tiles_for(&b), 1);
        // 300x20 spans two tiles at full size and one at half size.
        assert_eq!(tiles_for(&d), 3);

        let entries = fixture.writer.entries.lock();
        let d_entry = entries.iter().find(|entry| entry.url == d.to_string()).unwrap();
        assert_eq!((d_entry.width, d_entry.height, d_entry.format), (300, 20, TileFormat::Png));
        assert_eq!(fixture.writer.tiles.get_tiles(d_entry.id).len(), 3);
    }

    #[test]
    fn test_panicking_node_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.zip"), zip(&[("b.jpg", jpeg(20, 20)), ("c.png", png(20, 20))])).unwrap();
        let root = ResourceLocator::from_path(dir.path().join("a.zip")).unwrap();

        let fixture = Fixture::new(2, Settings::default()).with_codec(Arc::new(PanickingCodec));
        let events = fixture.run(&root);

        let (successes, errors) = terminal(&events);
        assert_eq!(successes, vec![&root]);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|(_, status)| *status == ResourceStatus::DecodeError));
        assert!(events.iter().any(|event| matches!(
            &event.kind,
            EventKind::Error(_, message) if message.contains("decoder blew up")
        )));
        assert_eq!(fixture.tracker.failed(), 2);
        assert_eq!(fixture.tracker.outstanding(), 0);
    }

    #[test]
    fn test_abort_after_quick_levels_stops_continuation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), jpeg(600, 300)).unwrap();
        let locator = ResourceLocator::from_path(dir.path().join("b.jpg")).unwrap();
        let fixture = Fixture::new(1, Settings { mode: Mode::Full, quick_levels: 1, ..Settings::default() });

        // Once the quick tile is written, queue a high priority job that
        // holds the only worker, so the continuation is still queued when
        // the request finishes.
        let gate = Mailbox::<()>::new();
        {
            let jobs = fixture.generator.jobs().clone();
            let gate = gate.clone();
            *fixture.writer.on_write.lock() = Some(Box::new(move || {
                let _blocker = jobs.submit(Priority::High, move |_| {
                    gate.recv_blocking();
                });
            }));
        }

        let sink = fixture.tracker.track(Arc::new(ChannelSink::new(locator.clone(), fixture.events.clone())));
        let handle = fixture.generator.request(locator, sink);
        assert_eq!(handle.wait(), JobStatus::Finished);
        handle.abort();
        gate.post(());
        fixture.tracker.wait_blocking();

        let events = fixture.events.drain();
        assert!(matches!(events.last().unwrap().kind, EventKind::Error(ResourceStatus::Cancelled, _)));
        assert!(!events.iter().any(|event| matches!(event.kind, EventKind::Success(_) | EventKind::ImageData(_))));
        let entry = fixture.writer.entries.lock()[0].clone();
        assert_eq!(fixture.writer.tiles.get_min_max_scale(entry.id), Some((2, 2)));
        assert_eq!(fixture.writer.tiles.len(), 1);
    }
}
