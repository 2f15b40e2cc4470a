//! Persistent vector index lifecycle.
//!
//! [`IndexManager`] owns one named collection in the vector backend and is
//! the single source of truth for "do we have retrievable data"
//! ([`IndexManager::exists`]). It embeds chunk text through the injected
//! [`Embedder`] and never deletes individual entries: removal is always a
//! collection-level reset followed by a rebuild from source, because the
//! backend has no reliable per-entry delete.
//!
//! Startup auto-recovery is inherent: the backend opens its persisted
//! storage on construction, so a collection written by a previous process
//! is visible to `exists()` without any rebinding step.

use anyhow::{bail, Result};
use std::sync::Arc;
use uuid::Uuid;

use crate::embedding::{embed_query, Embedder};
use crate::error::Error;
use crate::models::Chunk;
use crate::vector::{IndexEntry, VectorBackend};

pub struct IndexManager {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    batch_size: usize,
}

impl IndexManager {
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        collection: String,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            embedder,
            collection,
            batch_size: batch_size.max(1),
        }
    }

    /// True iff the collection exists and holds at least one entry.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.backend.has_collection(&self.collection).await?
            && self.backend.count(&self.collection).await? > 0)
    }

    /// Current entry count, 0 when no collection is present.
    pub async fn count(&self) -> Result<i64> {
        self.backend.count(&self.collection).await
    }

    /// Full replace: destroy any existing same-named collection and write
    /// entries for `chunks`. Embedding happens before anything is dropped or
    /// written, so a failed model call leaves the previous collection
    /// untouched and a backend failure writes nothing (transactional insert).
    pub async fn create(&self, chunks: &[Chunk]) -> Result<()> {
        let entries = self.embed_chunks(chunks).await?;

        self.backend.drop_collection(&self.collection).await?;
        self.backend
            .create_collection(&self.collection, self.embedder.dims())
            .await?;
        if !entries.is_empty() {
            self.backend.insert(&self.collection, &entries).await?;
        }

        tracing::info!(
            collection = %self.collection,
            entries = entries.len(),
            "created vector collection"
        );
        Ok(())
    }

    /// Append entries for `chunks` without touching existing ones. Behaves
    /// as [`create`](Self::create) when no collection is bound yet.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if !self.backend.has_collection(&self.collection).await? {
            return self.create(chunks).await;
        }

        let entries = self.embed_chunks(chunks).await?;
        if !entries.is_empty() {
            self.backend.insert(&self.collection, &entries).await?;
        }

        tracing::info!(
            collection = %self.collection,
            added = entries.len(),
            "appended to vector collection"
        );
        Ok(())
    }

    /// Top-`k` chunks by similarity to `text`, descending. An empty or
    /// absent collection yields an empty result, not an error.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<Chunk>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }

        let vector = embed_query(self.embedder.as_ref(), text).await?;
        let scored = self.backend.query(&self.collection, &vector, k).await?;
        Ok(scored.into_iter().map(|s| s.chunk).collect())
    }

    /// Retriever handle bound to the live collection.
    ///
    /// Fails with [`Error::NotReady`] when the index holds no entries; a
    /// handle over an empty index would silently answer from nothing.
    pub async fn retriever(&self, k: usize) -> Result<Retriever> {
        if !self.exists().await? {
            return Err(Error::NotReady.into());
        }

        Ok(Retriever {
            backend: Arc::clone(&self.backend),
            embedder: Arc::clone(&self.embedder),
            collection: self.collection.clone(),
            k,
        })
    }

    /// Delete the collection and the persisted storage behind it, then
    /// re-provision an empty store. `create`/`add` work immediately after.
    /// This is the only deletion path.
    pub async fn clear(&self) -> Result<()> {
        self.backend.reset_storage().await
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }

            for (chunk, embedding) in batch.iter().zip(vectors) {
                entries.push(IndexEntry {
                    id: Uuid::new_v4().to_string(),
                    source: chunk.source.clone(),
                    page: chunk.page,
                    seq: chunk.seq,
                    text: chunk.text.clone(),
                    embedding,
                });
            }
        }

        Ok(entries)
    }
}

/// A non-owning handle for top-`k` retrieval against a specific collection.
///
/// Consumed by the conversation engine; must be re-acquired after every
/// index mutation, or queries silently operate on a stale index.
#[derive(Clone)]
pub struct Retriever {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("collection", &self.collection)
            .field("k", &self.k)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Retrieve the top-`k` most similar chunks, in rank order.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let scored = self.backend.query(&self.collection, &vector, self.k).await?;
        Ok(scored.into_iter().map(|s| s.chunk).collect())
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
