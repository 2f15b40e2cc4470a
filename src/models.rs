//! Core data models used throughout docchat.
//!
//! These types represent the pages, chunks, and conversation turns that flow
//! through the upload, indexing, and question-answering pipeline.

use serde::Serialize;

/// Page-level text extracted from a source PDF, before chunking.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    /// Raw extracted text of one page.
    pub text: String,
    /// 1-based page number within the source document.
    pub page: u32,
}

/// A bounded text segment with source and page provenance.
///
/// Chunks are derived from pages and never mutated; the pipeline owns them
/// only until they are embedded and written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Filename of the source document within the store.
    pub source: String,
    /// 1-based page the chunk was cut from.
    pub page: u32,
    /// Index of the chunk within its source document, continuous across pages.
    pub seq: usize,
}

/// Provenance reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: u32,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Wire name used by chat-style model APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of accumulated conversation history.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Answer to a question, with the distinct source passages that backed it,
/// in retrieval-rank order.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Summary of the document store contents.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub count: usize,
    pub files: Vec<String>,
    pub total_size_bytes: u64,
}
