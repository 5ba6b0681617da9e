#![cfg(feature = "sqlite")]

use crate::storage_traits::{
    range_is_empty, validate_key, StateEntry, StateIterator, WorldState,
};
use crate::transaction::{WriteOp, WriteSet};
use anyhow::Context;
use cbdc_core::error::StoreError;
use log;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::runtime::Runtime;

/// Rows fetched per round trip while scanning
const DEFAULT_PAGE_SIZE: i64 = 256;

/// A SQLite-backed world state using sqlx.
///
/// Every key lives in a single `world_state` table. Range scans page
/// through the table in key order, so large scans never load the whole
/// keyspace at once.
pub struct SqliteWorldState {
    pool: SqlitePool,
    rt: Arc<Runtime>,
    db_path: PathBuf,
    page_size: i64,
}

impl SqliteWorldState {
    /// Opens (or creates) a SQLite world state at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let db_url = format!("sqlite:{}", db_path.to_string_lossy());

        // Create a runtime for async operations
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Other(format!("Failed to create runtime: {}", e)))?;
        let rt = Arc::new(rt);

        // Connect options
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        // Create connection pool
        let pool = rt
            .block_on(async {
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
            })
            .with_context(|| format!("Failed to connect to database at {:?}", db_path))?;

        // Initialize the database schema
        rt.block_on(Self::initialize_schema(&pool))
            .with_context(|| "Failed to initialize database schema")?;

        log::debug!("Opened SQLite world state at {:?}", db_path);

        Ok(Self {
            pool,
            rt,
            db_path,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override how many rows a range scan fetches per query
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Creates the world-state table
    async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS world_state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl WorldState for SqliteWorldState {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.rt.block_on(async {
            let row = sqlx::query("SELECT value FROM world_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to fetch key: {}", key))?;

            Ok(row.map(|row| row.get::<Vec<u8>, _>(0)))
        })
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        validate_key(key)?;
        self.rt.block_on(async {
            sqlx::query("INSERT OR REPLACE INTO world_state (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to store key: {}", key))?;

            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.rt.block_on(async {
            let result = sqlx::query("DELETE FROM world_state WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to delete key: {}", key))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Ok(())
        })
    }

    fn range_scan(&self, start_key: &str, end_key: &str) -> Box<dyn StateIterator + '_> {
        Box::new(SqliteStateIterator {
            pool: self.pool.clone(),
            rt: self.rt.clone(),
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            last_key: None,
            buffer: VecDeque::new(),
            page_size: self.page_size,
            exhausted: range_is_empty(start_key, end_key),
        })
    }

    fn apply(&self, write_set: &WriteSet) -> Result<(), StoreError> {
        for (key, _) in write_set.iter() {
            validate_key(key)?;
        }

        self.rt.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .with_context(|| "Failed to start database transaction")?;

            for (key, op) in write_set.iter() {
                match op {
                    WriteOp::Put(value) => {
                        sqlx::query(
                            "INSERT OR REPLACE INTO world_state (key, value) VALUES (?, ?)",
                        )
                        .bind(key.as_str())
                        .bind(value.as_slice())
                        .execute(&mut *tx)
                        .await
                        .with_context(|| format!("Failed to store key: {}", key))?;
                    }
                    WriteOp::Delete => {
                        sqlx::query("DELETE FROM world_state WHERE key = ?")
                            .bind(key.as_str())
                            .execute(&mut *tx)
                            .await
                            .with_context(|| format!("Failed to delete key: {}", key))?;
                    }
                }
            }

            tx.commit()
                .await
                .with_context(|| "Failed to commit transaction")?;

            Ok(())
        })
    }
}

/// Lazily pages through `world_state` in key order
pub struct SqliteStateIterator {
    pool: SqlitePool,
    rt: Arc<Runtime>,
    start_key: String,
    end_key: String,
    /// Last key handed out; the next page starts strictly after it
    last_key: Option<String>,
    buffer: VecDeque<StateEntry>,
    page_size: i64,
    exhausted: bool,
}

impl SqliteStateIterator {
    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let mut query = String::from("SELECT key, value FROM world_state WHERE ");
        query.push_str(if self.last_key.is_some() { "key > ?" } else { "key >= ?" });
        if !self.end_key.is_empty() {
            query.push_str(" AND key < ?");
        }
        query.push_str(" ORDER BY key LIMIT ?");

        let lower = self.last_key.clone().unwrap_or_else(|| self.start_key.clone());

        let rows = self.rt.block_on(async {
            let mut q = sqlx::query(&query).bind(lower);
            if !self.end_key.is_empty() {
                q = q.bind(self.end_key.as_str());
            }
            q.bind(self.page_size).fetch_all(&self.pool).await
        })?;

        if (rows.len() as i64) < self.page_size {
            self.exhausted = true;
        }

        for row in rows {
            let key: String = row.get(0);
            let value: Vec<u8> = row.get(1);
            self.buffer.push_back((key, value));
        }
        if let Some((key, _)) = self.buffer.back() {
            self.last_key = Some(key.clone());
        }
        Ok(())
    }
}

impl Iterator for SqliteStateIterator {
    type Item = Result<StateEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
