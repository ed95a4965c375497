//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults;
//! 2. a TOML, YAML or JSON file, picked by extension;
//! 3. `MOSAIC_`-prefixed environment variables, with `__` separating
//!    nested keys (`MOSAIC_JOBS__WORKERS=8`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::OptionExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use mosaic_jobs::QueuePolicy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub use crate::error::Error;

pub const ENV_PREFIX: &str = "MOSAIC_";
const FILE_STEM: &str = "mosaic";
const DATABASE_FILE: &str = "mosaic.sqlite3";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub jobs: JobsConfig,
    pub network: NetworkConfig,
    pub blobs: BlobsConfig,
    pub pyramid: PyramidConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `mosaic.sqlite3` in the platform data directory.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub workers: usize,
    pub policy: QueuePolicy,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, NonZeroUsize::get),
            policy: QueuePolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Attempts after the first for transient failures.
    pub retries: u32,
    /// Delay before the first retry, doubled for every further one.
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { retries: 3, backoff_ms: 250, max_backoff_ms: 5_000, timeout_secs: 30, user_agent: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobsConfig {
    /// Bytes of unreferenced blob payloads kept for reuse.
    pub cache_bytes: u64,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self { cache_bytes: 256 * 1024 * 1024 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Coarse levels generated before the rest of a pyramid.
    pub quick_levels: u32,
    pub jpeg_quality: u8,
    /// How often staged tiles are written to the database.
    pub flush_interval_ms: u64,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self { quick_levels: 3, jpeg_quality: 85, flush_interval_ms: 2_000 }
    }
}

impl Config {
    /// Load from every source. Without an explicit `file`, the first of
    /// `mosaic.{toml,yaml,yml,json}` found in the platform config directory
    /// is used, if any.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.display().to_string())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_file(),
        };
        tracing::debug!(file = ?file, "loading configuration");
        Self::from_figment(&Self::figment(file.as_deref())?)
    }

    /// The layered sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(|err| exn::Exn::from(ErrorKind::Load(err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.workers == 0 {
            exn::bail!(ErrorKind::Invalid("jobs.workers must be at least 1"));
        }
        if !(1..=100).contains(&self.pyramid.jpeg_quality) {
            exn::bail!(ErrorKind::Invalid("pyramid.jpeg_quality must be between 1 and 100"));
        }
        if self.pyramid.quick_levels == 0 {
            exn::bail!(ErrorKind::Invalid("pyramid.quick_levels must be at least 1"));
        }
        if self.pyramid.flush_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("pyramid.flush_interval_ms must be at least 1"));
        }
        Ok(())
    }

    /// Configured database path, or the default one.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or_raise(|| ErrorKind::NoProjectDirs)?;
        Ok(dirs.data_dir().join(DATABASE_FILE))
    }

    fn default_file() -> Option<PathBuf> {
        let dirs = project_dirs()?;
        ["toml", "yaml", "yml", "json"]
            .into_iter()
            .map(|ext| dirs.config_dir().join(format!("{FILE_STEM}.{ext}")))
            .find(|path| path.is_file())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.jobs.policy, QueuePolicy::Lifo);
        assert_eq!(config.network.retries, 3);
        assert_eq!(config.pyramid.quick_levels, 3);
        assert!(config.jobs.workers > 0);
    }

    #[rstest]
    #[case("mosaic.toml", "[jobs]\nworkers = 2\npolicy = \"fifo\"\n[pyramid]\njpeg_quality = 70\n")]
    #[case("mosaic.yaml", "jobs:\n  workers: 2\n  policy: fifo\npyramid:\n  jpeg_quality: 70\n")]
    #[case("mosaic.json", r#"{"jobs": {"workers": 2, "policy": "fifo"}, "pyramid": {"jpeg_quality": 70}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load(Some(Path::new(name))).unwrap();
            assert_eq!(config.jobs.workers, 2);
            assert_eq!(config.jobs.policy, QueuePolicy::Fifo);
            assert_eq!(config.pyramid.jpeg_quality, 70);
            // Untouched keys keep their defaults.
            assert_eq!(config.pyramid.quick_levels, 3);
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("mosaic.toml", "[network]\nretries = 1\ntimeout_secs = 5\n")?;
            jail.set_env("MOSAIC_NETWORK__RETRIES", "7");
            jail.set_env("MOSAIC_DATABASE__PATH", "/tmp/tiles.sqlite3");
            let config = Config::load(Some(Path::new("mosaic.toml"))).unwrap();
            assert_eq!(config.network.retries, 7);
            assert_eq!(config.network.timeout_secs, 5);
            assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/tiles.sqlite3"));
            Ok(())
        });
    }

    #[rstest]
    #[case("[jobs]\nworkers = 0\n")]
    #[case("[pyramid]\njpeg_quality = 0\n")]
    #[case("[pyramid]\njpeg_quality = 101\n")]
    #[case("[pyramid]\nquick_levels = 0\n")]
    fn test_rejects_invalid(#[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file("mosaic.toml", contents)?;
            let err = Config::load(Some(Path::new("mosaic.toml"))).unwrap_err();
            assert!(matches!(*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_and_unknown_files() {
        Jail::expect_with(|jail| {
            let err = Config::load(Some(Path::new("absent.toml"))).unwrap_err();
            assert_eq!(*err, ErrorKind::NotFound("absent.toml".to_string()));
            jail.create_file("mosaic.ini", "workers = 2")?;
            let err = Config::load(Some(Path::new("mosaic.ini"))).unwrap_err();
            assert_eq!(*err, ErrorKind::UnsupportedFormat("mosaic.ini".to_string()));
            jail.create_file("broken.toml", "[jobs\n")?;
            let err = Config::load(Some(Path::new("broken.toml"))).unwrap_err();
            assert!(matches!(*err, ErrorKind::Load(_)));
            Ok(())
        });
    }
}
