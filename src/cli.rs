use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mosaic", version, about = "Tile pyramids for large, nested image collections")]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "MOSAIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tile database, overriding the configured one
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate pyramids for every image reachable from the given sources
    Generate(GenerateArgs),
    /// List file entries, optionally filtered by a glob over their url
    List { pattern: Option<String> },
    /// Report inconsistencies between file entries and tiles
    Check,
    /// Import entries and tiles from other tile databases
    Merge {
        #[arg(required = true)]
        databases: Vec<PathBuf>,
    },
    /// Reclaim space left by deleted tiles
    Cleanup,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Only generate the coarse levels
    #[arg(long)]
    pub quick: bool,

    /// Worker threads, overriding the configured count
    #[arg(long)]
    pub workers: Option<usize>,

    /// Locators (`file:///a.zip!b.jpg`, `https://…`) or plain paths
    #[arg(required = true)]
    pub sources: Vec<String>,
}
