use crate::commands::open_database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_config::Config;
use std::process::ExitCode;

pub async fn run(config: &Config) -> Result<ExitCode> {
    let (db, tiles) = open_database(config).await?;
    let report = tiles.check().await.or_raise(|| ErrorKind::Database)?;
    db.close().await;

    for file_id in &report.orphaned_tiles {
        println!("orphaned tiles: file {file_id} has no entry");
    }
    for entry in &report.entries_without_tiles {
        println!("no tiles: {} {}", entry.id, entry.url);
    }
    for (entry, scale) in &report.tiles_beyond_max_scale {
        println!("bad scale: {} {} has scale {scale}, max is {}", entry.id, entry.url, entry.max_scale());
    }
    if report.is_clean() {
        tracing::info!("database is consistent");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
