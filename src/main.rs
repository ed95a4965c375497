mod cli;
mod commands;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use mosaic_config::Config;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().or_raise(|| ErrorKind::Runtime)?;
    match cli.command {
        Command::Generate(args) => commands::generate::run(&runtime, &config, args),
        Command::List { pattern } => runtime.block_on(commands::list::run(&config, pattern.as_deref())),
        Command::Check => runtime.block_on(commands::check::run(&config)),
        Command::Merge { databases } => runtime.block_on(commands::merge::run(&config, &databases)),
        Command::Cleanup => runtime.block_on(commands::cleanup::run(&config)),
    }
}
