//! Staging relational store
//!
//! A SQLite database holding exactly two tables: source rows waiting to be
//! transformed and the canonical rows the transform produced. Nothing in it
//! outlives a single file's remap.

use crate::ingest::remap::models::{IherbManifestEntry, StagedRecord, UniversalManifestEntry};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::debug;

/// Rows per multi-row INSERT. 59 binds per source row stays well under
/// SQLite's bind parameter limit.
const INSERT_CHUNK_SIZE: usize = 100;

/// Staging store over a SQLite pool
#[derive(Debug, Clone)]
pub struct StagingStore {
    pool: SqlitePool,
}

impl StagingStore {
    /// Open the store
    ///
    /// The pool is pinned to one long-lived connection: every connection to
    /// `sqlite::memory:` is its own database.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create both staging tables if absent
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(&create_table_sql::<IherbManifestEntry>())
            .execute(&self.pool)
            .await?;
        sqlx::raw_sql(&create_table_sql::<UniversalManifestEntry>())
            .execute(&self.pool)
            .await?;
        debug!("Staging schema ready");
        Ok(())
    }

    /// Delete every row from both tables
    pub async fn clear(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {}", IherbManifestEntry::TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM {}", UniversalManifestEntry::TABLE))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Bulk-insert source rows in one transaction
    pub async fn load_manifest_entries(
        &self,
        entries: &[IherbManifestEntry],
    ) -> Result<u64, sqlx::Error> {
        self.insert_all(entries).await
    }

    /// Bulk-insert canonical rows in one transaction
    pub async fn load_universal_entries(
        &self,
        entries: &[UniversalManifestEntry],
    ) -> Result<u64, sqlx::Error> {
        self.insert_all(entries).await
    }

    async fn insert_all<T: StagedRecord>(&self, entries: &[T]) -> Result<u64, sqlx::Error> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in entries.chunks(INSERT_CHUNK_SIZE) {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO {} (", T::TABLE));
            query_builder.push(T::COLUMNS.join(", "));
            query_builder.push(") ");

            query_builder.push_values(chunk, |mut b, entry| {
                entry.push_binds(&mut b);
            });

            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(table = T::TABLE, rows = inserted, "Loaded staging rows");
        Ok(inserted)
    }

    /// Run the transform statement verbatim
    ///
    /// The text may hold several `;`-separated statements.
    pub async fn apply_transform(&self, sql: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Every canonical row, in insertion order
    pub async fn universal_entries(&self) -> Result<Vec<UniversalManifestEntry>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id",
            UniversalManifestEntry::COLUMNS.join(", "),
            UniversalManifestEntry::TABLE
        );
        sqlx::query_as::<_, UniversalManifestEntry>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    /// Row count of a staging table
    pub async fn count<T: StagedRecord>(&self) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn create_table_sql<T: StagedRecord>() -> String {
    let columns: Vec<String> = T::COLUMNS
        .iter()
        .zip(T::SQL_TYPES)
        .map(|(name, ty)| format!("{} {}", name, ty))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        T::TABLE,
        columns.join(", ")
    )
}
