use crate::commands::open_database;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mosaic_config::Config;
use std::process::ExitCode;

pub async fn run(config: &Config) -> Result<ExitCode> {
    let (db, _) = open_database(config).await?;
    let reclaimed = db.vacuum().await.or_raise(|| ErrorKind::Database)?;
    println!("reclaimed {reclaimed} bytes");
    db.close().await;
    Ok(ExitCode::SUCCESS)
}
