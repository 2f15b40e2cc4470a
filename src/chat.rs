//! Stateful question-answering session.
//!
//! [`ConversationEngine`] binds a retriever handle and the generation
//! capability into a conversation with accumulated turn history. Retrieval
//! always happens first: the top-k chunks for the question become the
//! context block of a single non-streaming generation call, together with
//! the history so far.
//!
//! The retriever is a non-owning `Option` that must be rebound after every
//! index mutation; a stale handle answers from outdated or nonexistent
//! data. `clear` resets history only and never unbinds.

use anyhow::Result;
use std::sync::Arc;

use crate::error::Error;
use crate::index::Retriever;
use crate::llm::Generator;
use crate::models::{Answer, ChatRole, ChatTurn, Chunk, SourceRef};

pub struct ConversationEngine {
    generator: Arc<dyn Generator>,
    retriever: Option<Retriever>,
    history: Vec<ChatTurn>,
}

impl ConversationEngine {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            retriever: None,
            history: Vec::new(),
        }
    }

    /// (Re)create the session over a fresh retriever. History survives a
    /// rebind: the index changed, not the conversation.
    pub fn bind(&mut self, retriever: Retriever) {
        self.retriever = Some(retriever);
    }

    /// Drop the retriever binding, e.g. after a rebuild left the index empty.
    pub fn unbind(&mut self) {
        self.retriever = None;
    }

    pub fn is_bound(&self) -> bool {
        self.retriever.is_some()
    }

    /// Answer a question from the bound index.
    ///
    /// Fails with [`Error::NotBound`] when no retriever was ever bound. On
    /// success the turn is appended to history and the answer carries the
    /// distinct source passages used, in retrieval-rank order.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let retriever = self.retriever.as_ref().ok_or(Error::NotBound)?;

        let chunks = retriever.retrieve(question).await?;
        let prompt = build_prompt(question, &chunks);
        let text = self.generator.complete(&prompt, &self.history).await?;
        let sources = distinct_sources(&chunks);

        self.history.push(ChatTurn {
            role: ChatRole::User,
            content: question.to_string(),
        });
        self.history.push(ChatTurn {
            role: ChatRole::Assistant,
            content: text.clone(),
        });

        tracing::debug!(retrieved = chunks.len(), "answered question");
        Ok(Answer { text, sources })
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Reset the conversation. Does not unbind the retriever.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Context-stuffed prompt for a single generation call.
fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful AI assistant. Use the following context to answer \
         the user's question.\nIf you cannot find the answer in the context, \
         say so politely.\n\nContext: {}\n\nQuestion: {}\n\nAnswer: ",
        context, question
    )
}

/// Distinct (source, page) references in first-seen (rank) order.
fn distinct_sources(chunks: &[Chunk]) -> Vec<SourceRef> {
    let mut seen = Vec::new();
    for chunk in chunks {
        let source = SourceRef {
            source: chunk.source.clone(),
            page: chunk.page,
        };
        if !seen.contains(&source) {
            seen.push(source);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn complete(&self, prompt: &str, _history: &[ChatTurn]) -> Result<String> {
            Ok(format!("echo: {} chars of prompt", prompt.len()))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn chunk(source: &str, page: u32, seq: usize) -> Chunk {
        Chunk {
            text: format!("passage {} of {}", seq, source),
            source: source.to_string(),
            page,
            seq,
        }
    }

    #[tokio::test]
    async fn ask_before_bind_is_not_bound() {
        let mut engine = ConversationEngine::new(Arc::new(EchoGenerator));
        let err = engine.ask("what is this?").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotBound)));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let chunks = vec![chunk("doc.pdf", 1, 0), chunk("doc.pdf", 2, 1)];
        let prompt = build_prompt("what is covered?", &chunks);
        assert!(prompt.contains("passage 0 of doc.pdf"));
        assert!(prompt.contains("passage 1 of doc.pdf"));
        assert!(prompt.contains("Question: what is covered?"));
    }

    #[test]
    fn sources_are_distinct_and_rank_ordered() {
        let chunks = vec![
            chunk("b.pdf", 3, 4),
            chunk("a.pdf", 1, 0),
            chunk("b.pdf", 3, 5), // duplicate (source, page)
            chunk("a.pdf", 2, 1),
        ];
        let sources = distinct_sources(&chunks);
        assert_eq!(
            sources,
            vec![
                SourceRef { source: "b.pdf".into(), page: 3 },
                SourceRef { source: "a.pdf".into(), page: 1 },
                SourceRef { source: "a.pdf".into(), page: 2 },
            ]
        );
    }

    #[test]
    fn clear_resets_history_only() {
        let mut engine = ConversationEngine::new(Arc::new(EchoGenerator));
        engine.history.push(ChatTurn {
            role: ChatRole::User,
            content: "hi".into(),
        });
        engine.clear();
        assert!(engine.history().is_empty());
        assert!(!engine.is_bound());
    }
}
