//! Top-level orchestrator: uploads, questions, deletion, reset.
//!
//! [`Chatbot`] is the single entry point coordinating the document store,
//! the index manager, and the conversation engine. It is an explicitly
//! constructed context object with no global state, and holds the one
//! readiness flag (`initialized`, derived from "index is non-empty AND a
//! session is bound").
//!
//! Single-writer model: every mutating operation takes `&mut self`, so one
//! instance cannot interleave mutations; read-only probes take `&self`.
//! Callers sharing an instance across tasks wrap it in
//! `tokio::sync::RwLock`.

use anyhow::Result;
use std::sync::Arc;

use crate::chat::ConversationEngine;
use crate::chunk::split_pages;
use crate::config::Config;
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::index::IndexManager;
use crate::llm::{Generator, OllamaGenerator};
use crate::models::{Answer, ChatTurn, Chunk, StoreInfo};
use crate::store::{is_pdf_name, DocumentStore};
use crate::vector::{SqliteVectorBackend, VectorBackend};

/// Canned reply for questions asked before any document is indexed.
pub const NO_DOCUMENTS_REPLY: &str = "Please upload a PDF document first to start chatting.";

/// Readiness of the chatbot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatbotState {
    /// No retrievable data; questions get a canned reply.
    Empty,
    /// Index holds at least one chunk and a session is bound.
    Ready,
}

/// An upload handed to the orchestrator: original filename plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of processing one upload batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Files saved, loaded, and indexed.
    pub indexed: Vec<String>,
    /// Files rejected before entering the pipeline, with reasons.
    pub rejected: Vec<(String, String)>,
    /// Files saved but skipped because they could not be loaded.
    pub skipped: Vec<(String, String)>,
    /// Total chunks written to the index for this batch.
    pub chunks_indexed: usize,
}

pub struct Chatbot {
    config: Config,
    store: DocumentStore,
    index: IndexManager,
    session: ConversationEngine,
    initialized: bool,
}

impl Chatbot {
    /// Construct with injected capabilities.
    ///
    /// Probes the backend for a persisted non-empty collection and, when
    /// found, binds a session to it silently so the caller resumes without
    /// re-uploading.
    pub async fn new(
        config: Config,
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let store = DocumentStore::new(&config.storage.pdf_dir)?;
        let index = IndexManager::new(
            backend,
            embedder,
            config.index.collection.clone(),
            config.embedding.batch_size,
        );
        let mut session = ConversationEngine::new(generator);

        let mut initialized = false;
        if index.exists().await? {
            session.bind(index.retriever(config.retrieval.k).await?);
            initialized = true;
            tracing::info!(
                entries = index.count().await?,
                "recovered persisted index"
            );
        }

        Ok(Self {
            config,
            store,
            index,
            session,
            initialized,
        })
    }

    /// Construct with the production capabilities: SQLite vector storage
    /// plus Ollama embedding and generation.
    pub async fn from_config(config: Config) -> Result<Self> {
        let backend = Arc::new(SqliteVectorBackend::open(&config.storage.index_dir).await?);
        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        let generator = Arc::new(OllamaGenerator::new(&config.llm)?);
        Self::new(config, backend, embedder, generator).await
    }

    /// Process an upload batch end-to-end: validate → save → load → chunk →
    /// index → rebind.
    ///
    /// Per-file problems (wrong extension, oversized, unloadable) are
    /// reported and skipped without affecting the rest of the batch. A
    /// failure while embedding or writing aborts the whole batch and leaves
    /// the prior index state unchanged: either all new chunks are indexed
    /// or none are.
    pub async fn process_uploads(&mut self, files: Vec<UploadFile>) -> Result<UploadReport> {
        let max_bytes = self.config.storage.max_file_size_mb * 1024 * 1024;
        let mut report = UploadReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for file in &files {
            if !is_pdf_name(&file.name) {
                report
                    .rejected
                    .push((file.name.clone(), "not a .pdf file".to_string()));
                continue;
            }
            if file.bytes.len() as u64 > max_bytes {
                report.rejected.push((
                    file.name.clone(),
                    format!("larger than {} MB", self.config.storage.max_file_size_mb),
                ));
                continue;
            }

            let path = self.store.save(&file.name, &file.bytes)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.name.clone());

            match self.store.load(&path) {
                Ok(pages) => {
                    chunks.extend(split_pages(
                        &name,
                        &pages,
                        self.config.chunking.chunk_size,
                        self.config.chunking.chunk_overlap,
                    ));
                    report.indexed.push(name);
                }
                Err(e) => {
                    tracing::warn!(file = %name, "skipping unloadable upload: {}", e);
                    report.skipped.push((name, e.to_string()));
                }
            }
        }

        if chunks.is_empty() {
            return Ok(report);
        }

        report.chunks_indexed = chunks.len();
        self.index.add(&chunks).await?;
        self.rebind().await?;
        Ok(report)
    }

    /// Answer a question from the indexed documents.
    ///
    /// When nothing is indexed yet this returns the canned
    /// [`NO_DOCUMENTS_REPLY`] rather than erroring; the state stays `Empty`.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        if !self.initialized {
            return Ok(Answer {
                text: NO_DOCUMENTS_REPLY.to_string(),
                sources: Vec::new(),
            });
        }
        self.session.ask(question).await
    }

    /// Delete one stored document and rebuild the index from the remainder.
    /// Returns `false` when the file was not present (nothing to rebuild).
    pub async fn delete_document(&mut self, name: &str) -> Result<bool> {
        if !self.store.delete(name) {
            return Ok(false);
        }
        self.rebuild().await?;
        Ok(true)
    }

    /// Delete several stored documents, then rebuild once. Returns how many
    /// files were actually deleted.
    pub async fn delete_documents(&mut self, names: &[String]) -> Result<usize> {
        let deleted = self.store.delete_many(names);
        if deleted > 0 {
            self.rebuild().await?;
        }
        Ok(deleted)
    }

    /// Reset everything: index storage, conversation, stored PDFs.
    ///
    /// Best-effort: the state is forced to `Empty` even when a sub-step
    /// fails, and the first error is surfaced afterwards. Returns the
    /// number of PDFs deleted.
    pub async fn reset(&mut self) -> Result<usize> {
        let mut first_err: Option<anyhow::Error> = None;

        if let Err(e) = self.index.clear().await {
            tracing::warn!("reset: could not clear index: {}", e);
            first_err.get_or_insert(e);
        }

        self.session.clear();
        self.session.unbind();
        let deleted = self.store.delete_all();
        self.initialized = false;

        match first_err {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Similarity search over the current index, bypassing generation.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        self.index.query(query, k).await
    }

    /// Remove invalid files from the document store. Does not touch the
    /// index: an unloadable file never contributed chunks to it.
    pub fn clean(&mut self) -> usize {
        self.store.clean()
    }

    pub fn state(&self) -> ChatbotState {
        if self.initialized {
            ChatbotState::Ready
        } else {
            ChatbotState::Empty
        }
    }

    pub fn is_ready(&self) -> bool {
        self.initialized
    }

    /// Number of entries in the vector index.
    pub async fn chunk_count(&self) -> Result<i64> {
        self.index.count().await
    }

    /// Whether a persisted non-empty index is available.
    pub async fn has_persistent_data(&self) -> Result<bool> {
        self.index.exists().await
    }

    pub fn document_info(&self) -> StoreInfo {
        self.store.info()
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.session.history()
    }

    pub fn clear_history(&mut self) {
        self.session.clear();
    }

    /// Unconditional full rebuild from the remaining stored files. A file
    /// that fails to load is skipped with a warning; ending up with zero
    /// chunks is a legal transition back to `Empty`.
    async fn rebuild(&mut self) -> Result<()> {
        let mut chunks: Vec<Chunk> = Vec::new();

        for name in self.store.list() {
            let path = self.store.path_of(&name);
            match self.store.load(&path) {
                Ok(pages) => chunks.extend(split_pages(
                    &name,
                    &pages,
                    self.config.chunking.chunk_size,
                    self.config.chunking.chunk_overlap,
                )),
                Err(e) => {
                    tracing::warn!(file = %name, "skipping during rebuild: {}", e);
                }
            }
        }

        self.index.clear().await?;
        if !chunks.is_empty() {
            self.index.create(&chunks).await?;
        }
        self.rebind().await?;

        tracing::info!(chunks = chunks.len(), "rebuilt index after deletion");
        Ok(())
    }

    /// Refresh the session's retriever to match the index. Called at every
    /// mutation site; the session is unbound when the index emptied out.
    async fn rebind(&mut self) -> Result<()> {
        if self.index.exists().await? {
            let retriever = self.index.retriever(self.config.retrieval.k).await?;
            self.session.bind(retriever);
            self.initialized = true;
        } else {
            self.session.unbind();
            self.initialized = false;
        }
        Ok(())
    }
}
