//! Durable storage of file entries and their tiles.
//!
//! A file entry is always written before any of its tiles, and deleting an
//! entry deletes its tiles explicitly rather than relying on the schema's
//! cascade alone.

use crate::Database;
use crate::check::CheckReport;
use crate::error::{ErrorKind, Result};
use crate::models::{FileEntry, FileId, FileRow, Freshness, NewFileEntry, TileEntry, TilePos, TileRow};
use exn::ResultExt;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::instrument;

/// Outcome of [`TileDatabase::merge_from`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries created or refreshed from the other database.
    pub imported: usize,
    /// Entries already present with the same mtime.
    pub skipped: usize,
    pub tiles: usize,
}

/// Repository over the `files` and `tiles` tables.
#[derive(Debug, Clone)]
pub struct TileDatabase {
    pool: SqlitePool,
}

impl From<&Database> for TileDatabase {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl TileDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // File entries
    // =========================================================================

    /// Insert the entry for `new.url`, or reconcile it with the stored one.
    ///
    /// A stored entry with the same mtime is returned untouched along with
    /// its tiles. A stored entry with a different mtime is stale: its tiles
    /// are deleted and its columns refreshed, keeping its id.
    #[instrument(level = "debug", skip(self, new), fields(url = %new.url, freshness))]
    pub async fn store_file_entry(&self, new: &NewFileEntry) -> Result<(FileEntry, Freshness)> {
        let row = FileRow::try_from(new)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let existing: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file_entry.sql"))
            .bind(row.url.as_str())
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (stored, freshness) = match existing {
            Some(existing) if existing.mtime == row.mtime => (existing, Freshness::Unchanged),
            Some(existing) => {
                Self::delete_tiles_in(&mut tx, existing.file_id).await?;
                let refreshed: FileRow = sqlx::query_as(include_str!("../queries/refresh_file_entry.sql"))
                    .bind(existing.file_id)
                    .bind(row.size)
                    .bind(row.mtime)
                    .bind(row.width)
                    .bind(row.height)
                    .bind(row.format)
                    .fetch_one(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                (refreshed, Freshness::Refreshed)
            },
            None => {
                let created: FileRow = sqlx::query_as(include_str!("../queries/insert_file_entry.sql"))
                    .bind(row.url.as_str())
                    .bind(row.size)
                    .bind(row.mtime)
                    .bind(row.width)
                    .bind(row.height)
                    .bind(row.format)
                    .fetch_one(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                (created, Freshness::Created)
            },
        };
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::Span::current().record("freshness", tracing::field::display(freshness));
        Ok((FileEntry::try_from(stored)?, freshness))
    }

    pub async fn get_file_entry(&self, url: impl AsRef<str>) -> Result<Option<FileEntry>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file_entry.sql"))
            .bind(url.as_ref())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileEntry::try_from).transpose()
    }

    pub async fn get_file_entry_by_id(&self, id: FileId) -> Result<Option<FileEntry>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_file_entry_by_id.sql"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileEntry::try_from).transpose()
    }

    /// Entries whose url matches the SQL `GLOB` pattern, or every entry when
    /// no pattern is given. Sorted by url.
    pub async fn get_file_entries(&self, pattern: Option<&str>) -> Result<Vec<FileEntry>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_file_entries.sql"))
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FileEntry::try_from).collect()
    }

    /// Delete an entry and every tile belonging to it.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_file_entry(&self, id: FileId) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Self::delete_tiles_in(&mut tx, id.0).await?;
        let result = sqlx::query(include_str!("../queries/delete_file_entry.sql"))
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::FileNotFound(id.to_string()));
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn delete_tiles_in(tx: &mut Transaction<'_, Sqlite>, file_id: i64) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_tiles.sql"))
            .bind(file_id)
            .execute(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// Upsert every tile in one transaction: all of them land or none do.
    #[instrument(level = "debug", skip(self, tiles), fields(tiles = tiles.len()))]
    pub async fn store_tiles(&self, tiles: &[TileEntry]) -> Result<()> {
        if tiles.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for tile in tiles {
            sqlx::query(include_str!("../queries/upsert_tile.sql"))
                .bind(tile.file_id.0)
                .bind(i64::from(tile.scale))
                .bind(i64::from(tile.pos.x))
                .bind(i64::from(tile.pos.y))
                .bind(i64::from(tile.format))
                .bind(&*tile.payload)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    pub async fn get_tile(&self, id: FileId, scale: u32, pos: TilePos) -> Result<Option<TileEntry>> {
        let row: Option<TileRow> = sqlx::query_as(include_str!("../queries/get_tile.sql"))
            .bind(id.0)
            .bind(i64::from(scale))
            .bind(i64::from(pos.x))
            .bind(i64::from(pos.y))
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(TileEntry::try_from).transpose()
    }

    /// Every tile of a file, coarsest scale first.
    pub async fn get_tiles(&self, id: FileId) -> Result<Vec<TileEntry>> {
        let rows: Vec<TileRow> = sqlx::query_as(include_str!("../queries/get_tiles.sql"))
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(TileEntry::try_from).collect()
    }

    pub async fn has_tile(&self, id: FileId, scale: u32, pos: TilePos) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/has_tile.sql"))
            .bind(id.0)
            .bind(i64::from(scale))
            .bind(i64::from(pos.x))
            .bind(i64::from(pos.y))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Finest and coarsest stored scale, or `None` if the file has no tiles.
    pub async fn get_min_max_scale(&self, id: FileId) -> Result<Option<(u32, u32)>> {
        let (min, max): (Option<i64>, Option<i64>) = sqlx::query_as(include_str!("../queries/get_min_max_scale.sql"))
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (Some(min), Some(max)) = (min, max) else {
            return Ok(None);
        };
        let min = u32::try_from(min).or_raise(|| ErrorKind::InvalidData("tile scale"))?;
        let max = u32::try_from(max).or_raise(|| ErrorKind::InvalidData("tile scale"))?;
        Ok(Some((min, max)))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    #[instrument(level = "info", skip(self))]
    pub async fn check(&self) -> Result<CheckReport> {
        let orphaned: Vec<i64> = sqlx::query_scalar(include_str!("../queries/check_orphaned_tiles.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let rows: Vec<(FileRow, Option<i64>)> = sqlx::query(include_str!("../queries/check_max_scales.sql"))
            .try_map(|row: sqlx::sqlite::SqliteRow| {
                use sqlx::{FromRow, Row};
                Ok((FileRow::from_row(&row)?, row.try_get::<Option<i64>, _>("top_scale")?))
            })
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut report = CheckReport { orphaned_tiles: orphaned.into_iter().map(FileId).collect(), ..Default::default() };
        for (row, top_scale) in rows {
            let entry = FileEntry::try_from(row)?;
            match top_scale {
                None => report.entries_without_tiles.push(entry),
                Some(scale) => {
                    let scale = u32::try_from(scale).or_raise(|| ErrorKind::InvalidData("tile scale"))?;
                    if scale > entry.max_scale() {
                        report.tiles_beyond_max_scale.push((entry, scale));
                    }
                },
            }
        }
        Ok(report)
    }

    /// Copy every entry of `other`, with its tiles, into this database.
    ///
    /// Entries already present by url with the same mtime are skipped. File
    /// ids are assigned by this database and tiles remapped accordingly.
    #[instrument(level = "info", skip(self, other))]
    pub async fn merge_from(&self, other: &TileDatabase) -> Result<MergeReport> {
        let mut report = MergeReport::default();
        for entry in other.get_file_entries(None).await? {
            let (local, freshness) = self.store_file_entry(&entry.to_new()).await?;
            if freshness == Freshness::Unchanged {
                report.skipped += 1;
                continue;
            }
            let tiles: Vec<TileEntry> = other
                .get_tiles(entry.id)
                .await?
                .into_iter()
                .map(|tile| TileEntry { file_id: local.id, ..tile })
                .collect();
            self.store_tiles(&tiles).await?;
            report.imported += 1;
            report.tiles += tiles.len();
        }
        Ok(report)
    }
}
