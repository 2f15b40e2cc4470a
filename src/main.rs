//! # docchat CLI
//!
//! The `docchat` binary is the primary interface for docchat. It provides
//! commands for uploading PDF documents, asking questions, managing the
//! stored document set, and inspecting the persistent vector index.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat upload <files…>` | Save, chunk, embed, and index PDF files |
//! | `docchat ask "<question>"` | Answer one question with cited sources |
//! | `docchat chat` | Interactive question-answering session |
//! | `docchat list` | List stored documents |
//! | `docchat delete <names…>` | Delete documents and rebuild the index |
//! | `docchat search "<query>"` | Similarity search without generation |
//! | `docchat clean` | Remove invalid files from the document store |
//! | `docchat stats` | Show store and index statistics |
//! | `docchat reset --yes` | Delete all documents, the index, and history |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; a missing file falls back to the built-in defaults, which expect a
//! local Ollama instance at `http://localhost:11434`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use docchat::chatbot::{Chatbot, ChatbotState, UploadFile};
use docchat::config::{self, Config};
use docchat::models::Answer;

/// docchat: ask questions about your PDF documents, locally.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "A local-first PDF question answering assistant with a persistent vector index",
    version,
    long_about = "docchat chunks and embeds uploaded PDF documents into a durable SQLite-backed \
    vector index and answers natural-language questions from them through a local Ollama \
    instance, with conversational memory and cited source passages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Every key has a sane default; a missing file is not an error.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload one or more PDF files.
    ///
    /// Each file is saved into the managed directory, split into chunks,
    /// embedded, and added to the vector index. Invalid files (wrong
    /// extension, oversized, unreadable) are reported and skipped without
    /// affecting the rest of the batch.
    Upload {
        /// PDF files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a single question about the uploaded documents.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start an interactive question-answering session.
    ///
    /// Conversation history accumulates across questions within the
    /// session. Exit with `quit`, `exit`, or end-of-input.
    Chat,

    /// List the stored documents and index status.
    List,

    /// Delete stored documents and rebuild the index from the remainder.
    ///
    /// The index is always rebuilt in full from the remaining files, so no
    /// stale chunks from deleted documents can be retrieved afterwards.
    Delete {
        /// Filenames to delete (as shown by `docchat list`).
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Similarity search over the index, bypassing generation.
    Search {
        /// The search query.
        query: String,

        /// Number of chunks to return (defaults to retrieval.k).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Remove invalid files from the document store.
    ///
    /// Deletes files with the wrong extension and PDFs that fail to load.
    /// Valid documents are never touched.
    Clean,

    /// Show document store and vector index statistics.
    Stats,

    /// Delete all documents, the vector index, and conversation history.
    Reset {
        /// Confirm the reset; without this flag nothing is deleted.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Upload { files } => run_upload(config, files).await,
        Commands::Ask { question } => run_ask(config, &question).await,
        Commands::Chat => run_chat(config).await,
        Commands::List => run_list(config).await,
        Commands::Delete { names } => run_delete(config, names).await,
        Commands::Search { query, k } => run_search(config, &query, k).await,
        Commands::Clean => run_clean(config).await,
        Commands::Stats => run_stats(config).await,
        Commands::Reset { yes } => run_reset(config, yes).await,
    }
}

async fn run_upload(config: Config, files: Vec<PathBuf>) -> Result<()> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        uploads.push(UploadFile { name, bytes });
    }

    let mut chatbot = Chatbot::from_config(config).await?;
    let report = chatbot.process_uploads(uploads).await?;

    println!("upload");
    println!("  indexed: {} files", report.indexed.len());
    println!("  chunks written: {}", report.chunks_indexed);
    for (name, reason) in &report.rejected {
        println!("  rejected: {} ({})", name, reason);
    }
    for (name, reason) in &report.skipped {
        println!("  skipped: {} ({})", name, reason);
    }
    println!("  ready: {}", chatbot.is_ready());
    Ok(())
}

async fn run_ask(config: Config, question: &str) -> Result<()> {
    let mut chatbot = Chatbot::from_config(config).await?;
    let answer = chatbot.ask(question).await?;
    print_answer(&answer);
    Ok(())
}

async fn run_chat(config: Config) -> Result<()> {
    let mut chatbot = Chatbot::from_config(config).await?;

    if chatbot.is_ready() {
        let info = chatbot.document_info();
        println!(
            "{} chunks from {} PDFs loaded. Ask away (quit to exit).",
            chatbot.chunk_count().await?,
            info.count
        );
    } else {
        println!("No documents indexed yet — answers will ask you to upload first.");
    }

    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "quit" || question == "exit" {
            break;
        }

        match chatbot.ask(question).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("error: {:#}", e),
        }
    }
    Ok(())
}

async fn run_list(config: Config) -> Result<()> {
    let chatbot = Chatbot::from_config(config).await?;
    let info = chatbot.document_info();

    if info.files.is_empty() {
        println!("No documents stored.");
    } else {
        for file in &info.files {
            println!("  {}", file);
        }
        println!(
            "{} documents, {} — {} indexed chunks",
            info.count,
            format_bytes(info.total_size_bytes),
            chatbot.chunk_count().await?
        );
    }
    Ok(())
}

async fn run_delete(config: Config, names: Vec<String>) -> Result<()> {
    let mut chatbot = Chatbot::from_config(config).await?;
    let deleted = chatbot.delete_documents(&names).await?;

    println!("delete");
    println!("  deleted: {} files", deleted);
    println!("  remaining chunks: {}", chatbot.chunk_count().await?);
    println!("  ready: {}", chatbot.is_ready());
    Ok(())
}

async fn run_search(config: Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.k);
    let chatbot = Chatbot::from_config(config).await?;
    let chunks = chatbot.search(query, k).await?;

    if chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, chunk) in chunks.iter().enumerate() {
        let excerpt: String = chunk.text.chars().take(160).collect();
        println!("{}. {} (page {})", i + 1, chunk.source, chunk.page);
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
    }
    Ok(())
}

async fn run_clean(config: Config) -> Result<()> {
    let mut chatbot = Chatbot::from_config(config).await?;
    let removed = chatbot.clean();
    println!("clean");
    println!("  removed: {} files", removed);
    Ok(())
}

async fn run_stats(config: Config) -> Result<()> {
    let chatbot = Chatbot::from_config(config.clone()).await?;
    let info = chatbot.document_info();

    println!("docchat — Stats");
    println!("===============");
    println!();
    println!("  PDF dir:     {}", config.storage.pdf_dir.display());
    println!(
        "  Documents:   {} ({})",
        info.count,
        format_bytes(info.total_size_bytes)
    );
    println!("  Index dir:   {}", config.storage.index_dir.display());
    println!("  Collection:  {}", config.index.collection);
    println!("  Chunks:      {}", chatbot.chunk_count().await?);
    println!("  Ready:       {}", chatbot.is_ready());
    println!();
    println!(
        "  Embedding:   {} @ {}",
        config.embedding.model, config.embedding.url
    );
    println!("  LLM:         {} @ {}", config.llm.model, config.llm.url);
    Ok(())
}

async fn run_reset(config: Config, yes: bool) -> Result<()> {
    if !yes {
        println!("This deletes every stored PDF, the vector index, and the conversation.");
        println!("Re-run with --yes to confirm.");
        return Ok(());
    }

    let mut chatbot = Chatbot::from_config(config).await?;
    let deleted = chatbot.reset().await?;

    println!("reset");
    println!("  deleted: {} files", deleted);
    println!("  state: {:?}", ChatbotState::Empty);
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim());
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  {}. Page {} from {}", i + 1, source.page, source.source);
        }
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
