use crate::cli::GenerateArgs;
use crate::commands::open_database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_archive::ArchiveManager;
use mosaic_blob::fetch::DEFAULT_USER_AGENT;
use mosaic_blob::{Backoff, BlobManager, HttpFetcher};
use mosaic_cache::{MemoryTileDatabase, StagingWriter, TileDatabase};
use mosaic_config::Config;
use mosaic_generator::{Generator, LogSink, Mode, Settings, Tracker};
use mosaic_jobs::JobManager;
use mosaic_locator::ResourceLocator;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;

/// A source with a scheme is a locator; anything else is a local path.
fn parse_source(source: &str) -> Result<ResourceLocator> {
    let parsed = if source.contains("://") {
        source.parse::<ResourceLocator>()
    } else {
        ResourceLocator::from_path(source)
    };
    parsed.or_raise(|| ErrorKind::InvalidSource(source.to_string()))
}

fn blob_manager(config: &Config) -> BlobManager {
    let network = &config.network;
    let agent = network.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let fetcher = HttpFetcher::new(Duration::from_secs(network.timeout_secs), agent);
    BlobManager::new(ArchiveManager::default())
        .with_fetcher(Arc::new(fetcher))
        .with_backoff(Backoff {
            retries: network.retries,
            base: Duration::from_millis(network.backoff_ms),
            max: Duration::from_millis(network.max_backoff_ms),
        })
        .with_budget(config.blobs.cache_bytes)
}

pub fn run(runtime: &Runtime, config: &Config, args: GenerateArgs) -> Result<ExitCode> {
    let locators = args.sources.iter().map(|source| parse_source(source)).collect::<Result<Vec<_>>>()?;
    let (db, tiles) = runtime.block_on(open_database(config))?;

    let workers = args.workers.unwrap_or(config.jobs.workers);
    let jobs = JobManager::new(workers, config.jobs.policy).or_raise(|| ErrorKind::Jobs)?;
    let stage = Arc::new(MemoryTileDatabase::new());
    let writer = StagingWriter::new(tiles.clone(), Arc::clone(&stage), runtime.handle().clone());
    let settings = Settings {
        mode: if args.quick { Mode::Quick } else { Mode::Full },
        quick_levels: config.pyramid.quick_levels,
        jpeg_quality: config.pyramid.jpeg_quality,
    };
    let generator = Generator::new(jobs.clone(), Arc::new(blob_manager(config)), Arc::new(writer), settings);

    let tracker = Tracker::new();
    for locator in locators {
        tracing::info!(%locator, mode = %settings.mode, "generating");
        let sink = tracker.track(Arc::new(LogSink::new(locator.clone())));
        generator.request(locator, sink);
    }

    let period = Duration::from_millis(config.pyramid.flush_interval_ms);
    let mut written = runtime.block_on(flush_until_idle(&tracker, &stage, &tiles, period));
    jobs.shutdown();
    written += runtime.block_on(stage.flush(&tiles)).or_raise(|| ErrorKind::Database)?;
    runtime.block_on(db.close());

    tracing::info!(succeeded = tracker.succeeded(), failed = tracker.failed(), tiles = written, "finished");
    Ok(if tracker.failed() > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Flush the stage every `period` until every tracked tree has finished.
/// A failed flush leaves its tiles staged for the next one.
async fn flush_until_idle(tracker: &Tracker, stage: &MemoryTileDatabase, tiles: &TileDatabase, period: Duration) -> usize {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut written = 0;
    loop {
        tokio::select! {
            () = tracker.wait() => break,
            _ = ticker.tick() => match stage.flush(tiles).await {
                Ok(count) => written += count,
                Err(err) => tracing::warn!(error = ?err, staged = stage.len(), "flush failed; will retry"),
            },
        }
    }
    written
}
