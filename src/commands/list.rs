use crate::commands::open_database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_config::Config;
use std::process::ExitCode;

pub async fn run(config: &Config, pattern: Option<&str>) -> Result<ExitCode> {
    let (db, tiles) = open_database(config).await?;
    for entry in tiles.get_file_entries(pattern).await.or_raise(|| ErrorKind::Database)? {
        let scales = match tiles.get_min_max_scale(entry.id).await.or_raise(|| ErrorKind::Database)? {
            Some((min, max)) => format!("{min}..={max}"),
            None => "-".to_string(),
        };
        println!("{}\t{}\t{}×{}\t{scales}", entry.id, entry.url, entry.width, entry.height);
    }
    db.close().await;
    Ok(ExitCode::SUCCESS)
}
