//! `ragline chat` — Interactive terminal chat session.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use ragline_config::AppConfig;
use ragline_context::{ChatEngine, HeuristicTokenizer, TokenAccountant};
use ragline_core::error::Error;
use ragline_core::message::SessionId;
use ragline_providers::{LlmSummarizer, OpenAiCompatEmbedder, OpenAiCompatProvider};
use ragline_retrieval::{Chunker, InMemoryVectorStore};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(ingest: Option<std::path::PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for an API key early and give a clear error.
    if config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    RAGLINE_API_KEY = 'gsk-...'   (generic)");
        eprintln!("    GROQ_API_KEY    = 'gsk-...'   (for Groq)");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'    (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file (ragline.toml).");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    let summarizer = Arc::new(LlmSummarizer::new(provider.clone(), &config));
    let embedder = Arc::new(OpenAiCompatEmbedder::from_config(&config)?);
    let store = Arc::new(InMemoryVectorStore::new(
        embedder,
        Chunker::from_config(&config.retrieval),
    ));

    if let Some(dir) = &ingest {
        let indexed = ingest_directory(&store, dir).await?;
        println!("  Indexed {indexed} document(s) from {}", dir.display());
    }

    let engine = ChatEngine::new(
        &config,
        TokenAccountant::new(Arc::new(HeuristicTokenizer)),
        store.clone(),
        provider,
        summarizer,
    );
    let session = SessionId::new();

    println!();
    println!("  Ragline — Interactive Chat");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Documents: {} indexed", store.list_documents().await.len());
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'quit', 'exit' or 'q' to end the session.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        if query.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        match engine.handle_query(&session, query).await {
            Ok(outcome) => {
                println!();
                for line in outcome.answer.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(Error::Context(e)) => {
                println!();
                println!("  Assistant > {}", e.user_message());
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Index every .txt and .md file in `dir`, using the file name as the
/// document source.
async fn ingest_directory(
    store: &InMemoryVectorStore,
    dir: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut indexed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "txt" | "md"));
        if !is_text {
            continue;
        }

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        let text = std::fs::read_to_string(&path)?;
        match store.add_document(&source, &text).await {
            Ok(chunks) => {
                tracing::info!(source, chunks, "document indexed");
                indexed += 1;
            }
            Err(e) => eprintln!("  [Skip] {source}: {e}"),
        }
    }
    Ok(indexed)
}
