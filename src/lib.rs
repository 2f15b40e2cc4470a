//! # docchat
//!
//! A local-first PDF question-answering assistant with a persistent vector
//! index.
//!
//! docchat lets you upload PDF documents and ask natural-language questions
//! answered from their content, with conversational memory and cited source
//! passages. Documents are chunked deterministically, embedded through a
//! local model server, and stored in a durable vector index that survives
//! restarts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌───────────┐
//! │  PDFs   │──▶│   Pipeline    │──▶│  SQLite   │
//! │ (store) │   │ Chunk+Embed  │   │  vectors  │
//! └─────────┘   └──────────────┘   └─────┬─────┘
//!                                        │
//!                              ┌─────────┴────────┐
//!                              ▼                  ▼
//!                        ┌──────────┐      ┌──────────┐
//!                        │ retrieve │─────▶│ generate │
//!                        │  top-k   │      │  answer  │
//!                        └──────────┘      └──────────┘
//! ```
//!
//! Deleting a document triggers a full rebuild of the index from the
//! remaining files: the vector backend has no reliable per-entry delete,
//! so correctness (no orphaned stale embeddings) wins over the cost of
//! re-embedding.
//!
//! ## Quick Start
//!
//! ```bash
//! docchat upload report.pdf handbook.pdf   # save, chunk, embed, index
//! docchat ask "what does chapter 2 cover?" # one question with citations
//! docchat chat                             # interactive session
//! docchat delete report.pdf                # remove + rebuild index
//! docchat reset --yes                      # wipe everything
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error kinds |
//! | [`chunk`] | Recursive-boundary text chunking |
//! | [`store`] | Managed PDF document store |
//! | [`embedding`] | Embedding capability + vector helpers |
//! | [`llm`] | Generation capability |
//! | [`vector`] | Vector storage backend (SQLite) |
//! | [`index`] | Persistent vector index lifecycle |
//! | [`chat`] | Stateful question-answering session |
//! | [`chatbot`] | Top-level orchestrator |

pub mod chat;
pub mod chatbot;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod store;
pub mod vector;
