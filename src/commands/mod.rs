pub mod check;
pub mod cleanup;
pub mod generate;
pub mod list;
pub mod merge;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_cache::{Database, TileDatabase};
use mosaic_config::Config;

/// Open the configured tile database, creating it and its directory if
/// needed.
pub async fn open_database(config: &Config) -> Result<(Database, TileDatabase)> {
    let path = config.database_path().or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&path).await.or_raise(|| ErrorKind::Database)?;
    let tiles = TileDatabase::from(&db);
    Ok((db, tiles))
}
