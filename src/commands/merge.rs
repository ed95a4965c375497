use crate::commands::open_database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_cache::{Access, Database, TileDatabase};
use mosaic_config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

pub async fn run(config: &Config, sources: &[PathBuf]) -> Result<ExitCode> {
    let (db, tiles) = open_database(config).await?;
    for path in sources {
        if !path.is_file() {
            exn::bail!(ErrorKind::InvalidSource(path.display().to_string()));
        }
        let other = Database::open(path, Access::ReadOnly).await.or_raise(|| ErrorKind::Database)?;
        let report = tiles.merge_from(&TileDatabase::from(&other)).await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(
            source = %path.display(),
            imported = report.imported,
            skipped = report.skipped,
            tiles = report.tiles,
            "merged"
        );
        other.close().await;
    }
    db.close().await;
    Ok(ExitCode::SUCCESS)
}
