//! End-to-end tests for the upload → index → ask → delete → reset lifecycle.
//!
//! The embedding and generation capabilities are injected fakes (the model
//! servers are external collaborators); the vector backend and document
//! store are the real implementations over temp directories. Test PDFs are
//! generated with lopdf so the real extraction path is exercised.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

use docchat::chatbot::{Chatbot, ChatbotState, UploadFile, NO_DOCUMENTS_REPLY};
use docchat::chunk::split_pages;
use docchat::config::Config;
use docchat::embedding::Embedder;
use docchat::llm::Generator;
use docchat::models::ChatTurn;
use docchat::store::DocumentStore;
use docchat::vector::SqliteVectorBackend;

// ============ Injected fakes ============

/// Deterministic embedder: folds text bytes into a fixed-dims histogram.
/// Identical text always embeds identically, and no non-empty text embeds
/// to the zero vector.
struct HashEmbedder;

fn seed_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 8];
    for (i, b) in text.bytes().enumerate() {
        v[i % 8] += f32::from(b) / 255.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| seed_vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dims(&self) -> usize {
        8
    }
}

/// Generator that never calls out; answers mention how much context it saw.
struct CannedGenerator;

#[async_trait]
impl Generator for CannedGenerator {
    async fn complete(&self, prompt: &str, history: &[ChatTurn]) -> Result<String> {
        Ok(format!(
            "answer derived from {} prompt chars and {} prior turns",
            prompt.len(),
            history.len()
        ))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

// ============ Fixtures ============

/// Build a real multi-page PDF, one Tj text run per page.
fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 750.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

fn long_page(topic: &str) -> String {
    format!(
        "This page discusses {}. It repeats itself to exceed a single chunk. ",
        topic
    )
    .repeat(12)
}

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.pdf_dir = tmp.path().join("pdfs");
    config.storage.index_dir = tmp.path().join("index");
    config.chunking.chunk_size = 400;
    config.chunking.chunk_overlap = 50;
    config
}

async fn chatbot_for(config: Config) -> Chatbot {
    let backend = Arc::new(
        SqliteVectorBackend::open(&config.storage.index_dir)
            .await
            .expect("open backend"),
    );
    Chatbot::new(config, backend, Arc::new(HashEmbedder), Arc::new(CannedGenerator))
        .await
        .expect("construct chatbot")
}

fn upload(name: &str, pages: &[&str]) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        bytes: build_pdf(pages),
    }
}

/// Chunk count the pipeline should produce for a stored file, recomputed
/// through the same load + split path.
fn expected_chunks(config: &Config, name: &str) -> usize {
    let store = DocumentStore::new(&config.storage.pdf_dir).unwrap();
    let pages = store.load(&store.path_of(name)).unwrap();
    split_pages(
        name,
        &pages,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )
    .len()
}

// ============ Scenarios ============

#[tokio::test]
async fn ask_before_any_upload_returns_placeholder() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    assert_eq!(chatbot.state(), ChatbotState::Empty);

    let answer = chatbot.ask("what is X?").await.unwrap();
    assert_eq!(answer.text, NO_DOCUMENTS_REPLY);
    assert!(answer.sources.is_empty());
    assert_eq!(chatbot.state(), ChatbotState::Empty);
    assert!(chatbot.history().is_empty());
}

#[tokio::test]
async fn upload_indexes_and_answers_with_sources() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let mut chatbot = chatbot_for(config.clone()).await;

    let report = chatbot
        .process_uploads(vec![upload(
            "doc1.pdf",
            &[&long_page("solar panels"), &long_page("battery storage")],
        )])
        .await
        .unwrap();

    assert_eq!(report.indexed, vec!["doc1.pdf"]);
    assert!(report.rejected.is_empty());
    assert!(report.chunks_indexed > 0);
    assert_eq!(chatbot.state(), ChatbotState::Ready);
    assert_eq!(
        chatbot.chunk_count().await.unwrap(),
        report.chunks_indexed as i64
    );

    let answer = chatbot.ask("how do solar panels work?").await.unwrap();
    assert_ne!(answer.text, NO_DOCUMENTS_REPLY);
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.iter().all(|s| s.source == "doc1.pdf"));
    assert_eq!(chatbot.history().len(), 2);
}

#[tokio::test]
async fn non_pdf_uploads_are_rejected_without_hurting_the_batch() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    let report = chatbot
        .process_uploads(vec![
            UploadFile {
                name: "notes.txt".to_string(),
                bytes: b"plain text".to_vec(),
            },
            upload("real.pdf", &[&long_page("a valid document")]),
        ])
        .await
        .unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].0, "notes.txt");
    assert_eq!(report.indexed, vec!["real.pdf"]);
    assert_eq!(chatbot.state(), ChatbotState::Ready);
}

#[tokio::test]
async fn oversized_uploads_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.storage.max_file_size_mb = 0;
    let mut chatbot = chatbot_for(config).await;

    let report = chatbot
        .process_uploads(vec![upload("big.pdf", &[&long_page("too large")])])
        .await
        .unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].1.contains("larger than"));
    assert_eq!(chatbot.state(), ChatbotState::Empty);
}

#[tokio::test]
async fn corrupt_pdf_in_a_batch_is_skipped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    let report = chatbot
        .process_uploads(vec![
            UploadFile {
                name: "broken.pdf".to_string(),
                bytes: b"not a valid pdf at all".to_vec(),
            },
            upload("fine.pdf", &[&long_page("a readable document")]),
        ])
        .await
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "broken.pdf");
    assert_eq!(report.indexed, vec!["fine.pdf"]);
    assert_eq!(chatbot.state(), ChatbotState::Ready);
}

#[tokio::test]
async fn deletion_rebuilds_the_index_from_the_remaining_documents() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let mut chatbot = chatbot_for(config.clone()).await;

    chatbot
        .process_uploads(vec![
            upload("doc1.pdf", &[&long_page("alpha"), &long_page("beta")]),
            upload("doc2.pdf", &[&long_page("gamma")]),
        ])
        .await
        .unwrap();

    let doc1_chunks = expected_chunks(&config, "doc1.pdf");
    let doc2_chunks = expected_chunks(&config, "doc2.pdf");
    assert_eq!(
        chatbot.chunk_count().await.unwrap(),
        (doc1_chunks + doc2_chunks) as i64
    );

    assert!(chatbot.delete_document("doc1.pdf").await.unwrap());
    assert_eq!(chatbot.chunk_count().await.unwrap(), doc2_chunks as i64);
    assert_eq!(chatbot.state(), ChatbotState::Ready);

    // no chunk from the deleted file is retrievable afterwards
    let results = chatbot.search("alpha", 100).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|c| c.source == "doc2.pdf"));

    // deleting the last document transitions back to Empty
    assert!(chatbot.delete_document("doc2.pdf").await.unwrap());
    assert_eq!(chatbot.chunk_count().await.unwrap(), 0);
    assert_eq!(chatbot.state(), ChatbotState::Empty);
    let answer = chatbot.ask("anything left?").await.unwrap();
    assert_eq!(answer.text, NO_DOCUMENTS_REPLY);
}

#[tokio::test]
async fn deleting_a_missing_document_reports_false_and_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    chatbot
        .process_uploads(vec![upload("doc.pdf", &[&long_page("content")])])
        .await
        .unwrap();
    let before = chatbot.chunk_count().await.unwrap();

    assert!(!chatbot.delete_document("ghost.pdf").await.unwrap());
    assert_eq!(chatbot.chunk_count().await.unwrap(), before);
    assert_eq!(chatbot.state(), ChatbotState::Ready);
}

#[tokio::test]
async fn rebuild_skips_files_that_became_unloadable() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let mut chatbot = chatbot_for(config.clone()).await;

    chatbot
        .process_uploads(vec![
            upload("keep.pdf", &[&long_page("kept content")]),
            upload("drop.pdf", &[&long_page("dropped content")]),
        ])
        .await
        .unwrap();

    // keep.pdf gets corrupted on disk after it was indexed
    std::fs::write(config.storage.pdf_dir.join("keep.pdf"), b"garbage now").unwrap();

    // deleting drop.pdf forces a rebuild; the corrupted file is skipped,
    // zero chunks remain, and the state falls back to Empty
    assert!(chatbot.delete_document("drop.pdf").await.unwrap());
    assert_eq!(chatbot.chunk_count().await.unwrap(), 0);
    assert_eq!(chatbot.state(), ChatbotState::Empty);
}

#[tokio::test]
async fn reset_clears_index_store_and_history() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    chatbot
        .process_uploads(vec![upload("doc.pdf", &[&long_page("reset me")])])
        .await
        .unwrap();
    chatbot.ask("a question to build history").await.unwrap();
    assert_eq!(chatbot.history().len(), 2);

    let deleted = chatbot.reset().await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(chatbot.chunk_count().await.unwrap(), 0);
    assert!(chatbot.document_info().files.is_empty());
    assert_eq!(chatbot.state(), ChatbotState::Empty);
    assert!(chatbot.history().is_empty());

    let answer = chatbot.ask("still there?").await.unwrap();
    assert_eq!(answer.text, NO_DOCUMENTS_REPLY);
}

#[tokio::test]
async fn clean_removes_the_corrupt_file_and_keeps_the_valid_one() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let mut chatbot = chatbot_for(config.clone()).await;

    chatbot
        .process_uploads(vec![upload("valid.pdf", &[&long_page("healthy")])])
        .await
        .unwrap();
    std::fs::write(config.storage.pdf_dir.join("corrupt.pdf"), b"junk bytes").unwrap();

    assert_eq!(chatbot.clean(), 1);
    assert_eq!(chatbot.document_info().files, vec!["valid.pdf"]);
}

#[tokio::test]
async fn startup_recovers_from_a_persisted_index() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);

    let chunk_count = {
        let mut chatbot = chatbot_for(config.clone()).await;
        chatbot
            .process_uploads(vec![upload("doc.pdf", &[&long_page("durable data")])])
            .await
            .unwrap();
        chatbot.chunk_count().await.unwrap()
    };
    assert!(chunk_count > 0);

    // a fresh instance over the same directories resumes without re-upload
    let mut revived = chatbot_for(config).await;
    assert_eq!(revived.state(), ChatbotState::Ready);
    assert!(revived.has_persistent_data().await.unwrap());
    assert_eq!(revived.chunk_count().await.unwrap(), chunk_count);

    let answer = revived.ask("still answerable?").await.unwrap();
    assert_ne!(answer.text, NO_DOCUMENTS_REPLY);
    assert!(!answer.sources.is_empty());
}

#[tokio::test]
async fn search_respects_k_and_rank_order() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    chatbot
        .process_uploads(vec![upload(
            "doc.pdf",
            &[&long_page("first topic"), &long_page("second topic")],
        )])
        .await
        .unwrap();

    let total = chatbot.chunk_count().await.unwrap() as usize;
    assert!(total >= 3);

    let limited = chatbot.search("first topic", 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    let all = chatbot.search("first topic", total + 10).await.unwrap();
    assert_eq!(all.len(), total);
}

#[tokio::test]
async fn empty_upload_batch_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    let report = chatbot.process_uploads(Vec::new()).await.unwrap();
    assert!(report.indexed.is_empty());
    assert_eq!(report.chunks_indexed, 0);
    assert_eq!(chatbot.state(), ChatbotState::Empty);
}

#[tokio::test]
async fn conversation_history_accumulates_and_clear_keeps_readiness() {
    let tmp = TempDir::new().unwrap();
    let mut chatbot = chatbot_for(test_config(&tmp)).await;

    chatbot
        .process_uploads(vec![upload("doc.pdf", &[&long_page("memory test")])])
        .await
        .unwrap();

    chatbot.ask("first question").await.unwrap();
    chatbot.ask("second question").await.unwrap();
    assert_eq!(chatbot.history().len(), 4);

    chatbot.clear_history();
    assert!(chatbot.history().is_empty());
    assert_eq!(chatbot.state(), ChatbotState::Ready);

    // still answerable after a history reset
    let answer = chatbot.ask("third question").await.unwrap();
    assert_ne!(answer.text, NO_DOCUMENTS_REPLY);
}
