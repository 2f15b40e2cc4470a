//! Vector storage backend.
//!
//! The [`VectorBackend`] trait is the storage collaborator consumed by the
//! index manager: collection create/destroy, transactional bulk insert,
//! similarity query by vector, and counts, all addressed by a collection
//! name. [`SqliteVectorBackend`] is the durable implementation: a single
//! SQLite file under the managed index directory, embeddings stored as
//! little-endian f32 BLOBs, similarity ranked by a brute-force cosine scan.
//!
//! The backend has no reliable per-entry delete; removal is collection-level
//! (`drop_collection`) or storage-level (`reset_storage`). Callers that need
//! to forget a subset of entries rebuild the collection from source.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::RwLock;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::Error;
use crate::models::Chunk;

/// Database filename within the managed index directory.
const DB_FILE: &str = "index.sqlite3";

/// An embedded chunk as persisted in a collection.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Entry UUID.
    pub id: String,
    /// Source document filename.
    pub source: String,
    /// 1-based page number within the source.
    pub page: u32,
    /// Chunk sequence index within the source.
    pub seq: usize,
    /// Chunk text.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// A chunk returned from a similarity query, with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Abstract vector storage consumed by the index manager.
///
/// Implementations must be `Send + Sync`; all operations are async via
/// `async-trait`.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Register a collection (idempotent; updates dims on conflict).
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()>;

    /// Remove a collection and all its entries. Returns `false` when the
    /// collection did not exist.
    async fn drop_collection(&self, name: &str) -> Result<bool>;

    /// Whether a collection of this name is registered.
    async fn has_collection(&self, name: &str) -> Result<bool>;

    /// Bulk-insert entries into a collection, transactionally: either every
    /// entry is written or none are.
    async fn insert(&self, name: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Top-`k` entries of the collection by cosine similarity to `vector`,
    /// descending. An absent or empty collection yields an empty result.
    async fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Entry count for a collection, 0 when absent.
    async fn count(&self, name: &str) -> Result<i64>;

    /// Tear down the persisted storage entirely and re-provision an empty
    /// store at the same path. Collections can be created again immediately.
    async fn reset_storage(&self) -> Result<()>;
}

/// Durable SQLite-backed vector store.
pub struct SqliteVectorBackend {
    dir: PathBuf,
    pool: RwLock<SqlitePool>,
}

impl SqliteVectorBackend {
    /// Open (or create) the store under `dir`. The directory and schema are
    /// provisioned on first use; an existing database is picked up as-is, so
    /// collections survive process restarts.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", dir.display(), e)))?;

        let pool = connect(dir).await?;
        migrate(&pool).await?;

        Ok(Self {
            dir: dir.to_path_buf(),
            pool: RwLock::new(pool),
        })
    }
}

async fn connect(dir: &Path) -> Result<SqlitePool> {
    let db_path = dir.join(DB_FILE);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| Error::Storage(format!("cannot open {}: {}", db_path.display(), e)))?;

    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            source TEXT NOT NULL,
            page INTEGER NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection)")
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait]
impl VectorBackend for SqliteVectorBackend {
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        let pool = self.pool.read().await;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO collections (name, dims, created_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET dims = excluded.dims
            "#,
        )
        .bind(name)
        .bind(dims as i64)
        .bind(now)
        .execute(&*pool)
        .await?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<bool> {
        let pool = self.pool.read().await;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let dropped = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;
        Ok(dropped)
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        let pool = self.pool.read().await;
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(name)
                .fetch_one(&*pool)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, name: &str, entries: &[IndexEntry]) -> Result<()> {
        let pool = self.pool.read().await;
        let mut tx = pool.begin().await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO entries (id, collection, source, page, seq, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(name)
            .bind(&entry.source)
            .bind(entry.page as i64)
            .bind(entry.seq as i64)
            .bind(&entry.text)
            .bind(vec_to_blob(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let pool = self.pool.read().await;

        let rows = sqlx::query(
            "SELECT source, page, seq, text, embedding FROM entries WHERE collection = ?",
        )
        .bind(name)
        .fetch_all(&*pool)
        .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let embedding = blob_to_vec(&blob);
                let page: i64 = row.get("page");
                let seq: i64 = row.get("seq");

                ScoredChunk {
                    chunk: Chunk {
                        text: row.get("text"),
                        source: row.get("source"),
                        page: page as u32,
                        seq: seq as usize,
                    },
                    score: cosine_similarity(vector, &embedding),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn count(&self, name: &str) -> Result<i64> {
        let pool = self.pool.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(name)
            .fetch_one(&*pool)
            .await?;
        Ok(count)
    }

    async fn reset_storage(&self) -> Result<()> {
        let mut pool = self.pool.write().await;
        pool.close().await;

        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .map_err(|e| Error::Storage(format!("cannot clear {}: {}", self.dir.display(), e)))?;
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let fresh = connect(&self.dir).await?;
        migrate(&fresh).await?;
        *pool = fresh;

        tracing::info!("vector storage reset at {}", self.dir.display());
        Ok(())
    }
}
