//! Tile store files and their connection pools.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Tile payloads are large and read in bursts while panning, so every
/// connection gets a bigger page cache and memory map than SQLite's default.
const TUNING: &str = r#"
    PRAGMA locking_mode = NORMAL;
    PRAGMA wal_autocheckpoint = 800;
    PRAGMA cache_size = -16384;
    PRAGMA temp_store = MEMORY;
    PRAGMA mmap_size = 67108864;
"#;

/// How a tile store file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// The working store: created if missing, migrated, one flush writer
    /// plus viewers.
    ReadWrite,
    /// Someone else's store, e.g. the source of a merge. Never created or
    /// migrated, and its schema must already be current.
    ReadOnly,
}

impl Access {
    fn max_connections(self) -> u32 {
        match self {
            Self::ReadWrite => 4,
            Self::ReadOnly => 2,
        }
    }
}

/// Connection pool for one tile store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Page accounting of a store file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreSize {
    pub page_size: u64,
    pub pages: u64,
    /// Pages left behind by deleted tiles.
    pub free_pages: u64,
}

impl StoreSize {
    pub fn bytes(&self) -> u64 {
        self.page_size * self.pages
    }

    pub fn reclaimable(&self) -> u64 {
        self.page_size * self.free_pages
    }
}

impl Database {
    /// Open the working store at `path`, creating it and its directory if
    /// needed.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, Access::ReadWrite).await
    }

    #[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>, access: Access) -> Result<Self> {
        let path = path.as_ref();
        let options = match access {
            Access::ReadWrite => {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
                }
                Self::writable().filename(path).create_if_missing(true)
            },
            Access::ReadOnly => Self::readable().filename(path).read_only(true),
        };
        let db = Self { pool: Self::pool_for(options, access.max_connections()).await? };
        match access {
            Access::ReadWrite => db.migrate().await?,
            Access::ReadOnly => db.ensure_current().await?,
        }
        Ok(db)
    }

    /// A private store living only as long as the pool.
    ///
    /// Not behind `#[cfg(test)]`: other crates use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Each connection to ":memory:" opens a separate database.
        let db = Self { pool: Self::pool_for(Self::writable().filename(":memory:"), 1).await? };
        db.migrate().await?;
        Ok(db)
    }

    async fn pool_for(options: SqliteConnectOptions, max: u32) -> Result<SqlitePool> {
        SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::tune(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    fn readable() -> SqliteConnectOptions {
        // A flush holds the write lock for a whole batch of tiles.
        SqliteConnectOptions::new().foreign_keys(true).busy_timeout(Duration::from_millis(1500))
    }

    fn writable() -> SqliteConnectOptions {
        Self::readable()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    async fn tune(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(TUNING).execute(conn).await?;
        Ok(())
    }

    #[instrument("migrating tile store", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Fail unless every embedded migration has been applied to this store.
    async fn ensure_current(&self) -> Result<()> {
        let latest = MIGRATOR.iter().map(|migration| migration.version).max();
        let applied: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Migration)?;
        if applied != latest {
            tracing::warn!(?applied, ?latest, "tile store schema is not current");
            exn::bail!(ErrorKind::Migration);
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn size(&self) -> Result<StoreSize> {
        let pragma = |name: &'static str| async move {
            let value: i64 = sqlx::query_scalar(name).fetch_one(&self.pool).await.or_raise(|| ErrorKind::Database)?;
            u64::try_from(value).or_raise(|| ErrorKind::InvalidData("negative page count"))
        };
        Ok(StoreSize {
            page_size: pragma("PRAGMA page_size").await?,
            pages: pragma("PRAGMA page_count").await?,
            free_pages: pragma("PRAGMA freelist_count").await?,
        })
    }

    /// Rebuild the store file without the pages freed by deleted tiles.
    /// Returns the number of bytes given back to the filesystem.
    #[instrument(level = "info", skip(self))]
    pub async fn vacuum(&self) -> Result<u64> {
        let before = self.size().await?;
        sqlx::query("VACUUM").execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("PRAGMA optimize").execute(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        let after = self.size().await?;
        let reclaimed = before.bytes().saturating_sub(after.bytes());
        tracing::info!(reclaimed, bytes = after.bytes(), "vacuumed tile store");
        Ok(reclaimed)
    }

    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
