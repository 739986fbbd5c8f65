use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::RagError;
use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::generator::AnswerGenerator;
use crate::http::HttpClient;
use crate::indexer::{IndexReport, Indexer};
use crate::ingest::{ChunkingConfig, Loader, Source, split_documents};
use crate::llm::{LanguageModel, build_language_model};
use crate::pipeline::{RagPipeline, TurnOutcome};
use crate::retriever::Retriever;
use crate::session::ChatSession;
use crate::store::VectorStore;
use crate::tasks::{self, EmailCategory, MemoryChat, NewsCategory};

const CLEAR_COMMAND: &str = "/clear";
const EXIT_COMMAND: &str = "/exit";

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = OllamaClient::new(config)?;
    Ok(Arc::new(client))
}

async fn open_store(config: &Config) -> Result<VectorStore> {
    let path = config.vector_database_path();
    let store = VectorStore::open(&path, config.retrieval.distance)
        .await
        .with_context(|| format!("Failed to open vector store at {}", path.display()))?;
    Ok(store)
}

async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    // Provider first: a missing API key should fail before touching the store.
    let model = build_language_model(config)?;
    let embedder = build_embedder(config)?;

    if !VectorStore::exists(&config.vector_database_path()) {
        warn!("No documents have been ingested yet; answers will have no context");
    }

    let retriever =
        Retriever::new(open_store(config).await?, embedder).with_top_k(config.retrieval.top_k);
    Ok(RagPipeline::new(retriever, AnswerGenerator::new(model)))
}

/// Load a file, feed or video transcript and add it to the vector store
#[inline]
pub async fn ingest_source(
    config: &Config,
    input: &str,
    chunking: ChunkingConfig,
) -> Result<IndexReport> {
    chunking.validate()?;
    let source = Source::detect(input)?;
    let loader = Loader::new(HttpClient::from_config(&config.http));

    let documents = loader.load(&source)?;
    let chunks = split_documents(&documents, &chunking)?;
    println!(
        "Loaded {} document(s) from {}, split into {} chunk(s)",
        documents.len(),
        source,
        chunks.len()
    );

    let embedder = OllamaClient::new(config)?;
    embedder
        .health_check()
        .context("Ollama is not ready for embedding")?;

    let mut indexer = Indexer::new(open_store(config).await?, Arc::new(embedder))
        .with_batch_size(config.ollama.batch_size as usize)
        .with_expected_dimension(config.ollama.embedding_dimension as usize)
        .with_stale_lock(std::time::Duration::from_secs(
            config.store.stale_lock_seconds,
        ));
    let report = indexer.index(&chunks).await?;

    println!(
        "{} Indexed {} chunk(s); {} total in {}",
        style("✓").green(),
        report.chunks_indexed,
        report.total_chunks,
        config.vector_database_path().display()
    );
    Ok(report)
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Answered { answer, sources } => {
            println!("{}", answer.trim());
            if !sources.is_empty() {
                println!();
                println!("{}", style("Sources:").dim());
                for source in sources {
                    let page = source
                        .metadata
                        .page
                        .map_or_else(String::new, |page| format!(" (page {page})"));
                    println!(
                        "  {} {}{} [distance {:.4}]",
                        style("•").dim(),
                        source.metadata.source,
                        page,
                        source.distance
                    );
                }
            }
        }
        TurnOutcome::Rejected { warning } => {
            eprintln!("{} {}", style("⚠").yellow(), warning);
        }
        TurnOutcome::Failed { stage, message } => {
            eprintln!("{} Failed while {}: {}", style("✗").red(), stage, message);
        }
    }
}

/// Answer one question from the indexed documents
#[inline]
pub async fn ask_question(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let mut session = ChatSession::new();

    let k = k.unwrap_or(config.retrieval.top_k);
    let outcome = pipeline.ask_with_k(&mut session, question, k).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Read one line of user input. `None` means the user asked to quit.
fn read_line(prompt: &str) -> Result<Option<String>> {
    let line: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .context("Failed to read input")?;
    let line = line.trim().to_string();
    Ok((line != EXIT_COMMAND).then_some(line))
}

/// Interactive question answering over the indexed documents
#[inline]
pub async fn run_chat(config: &Config, k: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let k = k.unwrap_or(config.retrieval.top_k);
    let mut session = ChatSession::new();

    info!("Started chat session {}", session.id());
    eprintln!(
        "{}",
        style(format!(
            "Ask about your documents. Type {CLEAR_COMMAND} to reset history, {EXIT_COMMAND} to quit."
        ))
        .dim()
    );

    while let Some(input) = read_line("You")? {
        if input == CLEAR_COMMAND {
            session.clear();
            eprintln!("{}", style("History cleared.").dim());
            continue;
        }
        let outcome = pipeline.ask_with_k(&mut session, &input, k).await?;
        print_outcome(&outcome);
        println!();
    }

    Ok(())
}

/// Print a failed chat turn and keep the loop going, unless the error is fatal.
/// Rejected input is a warning, like a rejected question in `run_chat`.
fn report_chat_error(error: RagError) -> Result<()> {
    match error {
        RagError::Validation(warning) => eprintln!("{} {}", style("⚠").yellow(), warning),
        e if e.is_recoverable() => eprintln!("{} {}", style("✗").red(), e),
        e => return Err(e.into()),
    }
    Ok(())
}

/// Chat with memory of the conversation but without retrieval
#[inline]
pub fn run_talk(config: &Config) -> Result<()> {
    let chat = MemoryChat::new(build_language_model(config)?);
    let mut session = ChatSession::new();

    eprintln!(
        "{}",
        style(format!(
            "Chat with {}. Type {CLEAR_COMMAND} to forget, {EXIT_COMMAND} to quit.",
            config.generation.provider
        ))
        .dim()
    );

    while let Some(input) = read_line("You")? {
        if input == CLEAR_COMMAND {
            session.clear();
            continue;
        }
        match chat.send(&mut session, &input) {
            Ok(answer) => println!("{}\n", answer.trim()),
            Err(e) => report_chat_error(e)?,
        }
    }

    Ok(())
}

/// Show the state of the vector store and the providers
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    let path = config.vector_database_path();
    println!("🔍 Vector Store:");
    println!("   📁 Path: {}", path.display());
    if VectorStore::exists(&path) {
        match open_store(config).await {
            Ok(store) => {
                println!("   ✅ LanceDB: Connected ({} distance)", store.metric());
                match store.count().await {
                    Ok(count) => println!("   📊 Chunks: {}", count),
                    Err(e) => println!("   ⚠️  Chunks: Error - {}", e),
                }
                if let Some(dimension) = store.dimension() {
                    println!("   🔢 Dimension: {}", dimension);
                }
            }
            Err(e) => println!("   ❌ LanceDB: Failed to open - {:#}", e),
        }
    } else {
        println!("   📭 Not created yet. Run 'rag-chat ingest <SOURCE>' first.");
    }

    println!();
    println!("🤖 Ollama:");
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!("   ✅ Connected at {}", client.base_url());
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            }
            Err(e) => println!("   ❌ Unavailable - {:#}", e),
        },
        Err(e) => println!("   ❌ Invalid configuration - {:#}", e),
    }

    println!();
    println!("💬 Generation:");
    println!("   Provider: {}", config.generation.provider);
    match build_language_model(config) {
        Ok(model) => println!("   ✅ Model: {}", model.model_name()),
        Err(e) => println!("   ❌ {}", e),
    }

    Ok(())
}

/// Summarize the latest headlines for a news category
#[inline]
pub fn summarize_news(config: &Config, category: NewsCategory, limit: usize) -> Result<()> {
    let model = build_language_model(config)?;
    let http = HttpClient::from_config(&config.http);

    let items = tasks::fetch_headlines(&http, category, limit)?;
    println!("{}", style(format!("📰 {category} headlines")).bold());
    for item in &items {
        println!("  - {} ({})", item.title, item.link);
    }
    println!();

    let summary = tasks::summarize_headlines(model.as_ref(), &items)?;
    println!("{}", summary.trim());
    Ok(())
}

/// Summarize the transcript of a YouTube video
#[inline]
pub fn summarize_video(config: &Config, url: &str) -> Result<()> {
    let model = build_language_model(config)?;
    let source = Source::detect(url)?;
    if !matches!(source, Source::Transcript(_)) {
        anyhow::bail!("Not a YouTube URL: {url}");
    }

    let loader = Loader::new(HttpClient::from_config(&config.http));
    let transcript: String = loader
        .load(&source)?
        .into_iter()
        .map(|document| document.text)
        .collect();

    let summary = tasks::summarize_transcript(model.as_ref(), &transcript)?;
    println!("{}", summary.trim());
    Ok(())
}

/// Generate markdown notes, optionally saving them to a file
#[inline]
pub fn write_notes(config: &Config, topic: &str, output: Option<&Path>) -> Result<()> {
    let model = build_language_model(config)?;
    let notes = tasks::generate_notes(model.as_ref(), topic)?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{notes}\n"))
                .with_context(|| format!("Failed to write notes to {}", path.display()))?;
            eprintln!(
                "{} Notes saved to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => println!("{notes}"),
    }
    Ok(())
}

/// Draft an email about a topic
#[inline]
pub fn write_email(config: &Config, topic: &str, category: EmailCategory) -> Result<()> {
    let model: Arc<dyn LanguageModel> = build_language_model(config)?;
    let draft = tasks::draft_email(model.as_ref(), topic, category)?;
    println!("{draft}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::test_support::{RecordingModel, Reply};

    #[test]
    fn blank_talk_input_is_a_warning_not_an_exit() {
        let chat = MemoryChat::new(Arc::new(RecordingModel::new(Reply::Echo)));
        let mut session = ChatSession::new();

        let err = chat.send(&mut session, "   ").expect_err("should reject blank input");

        assert!(matches!(err, RagError::Validation(_)));
        assert!(report_chat_error(err).is_ok());
        assert!(session.is_empty());
    }

    #[test]
    fn provider_failures_keep_the_chat_going() {
        let err = RagError::Generation("rate limited".to_string());
        assert!(report_chat_error(err).is_ok());
    }

    #[test]
    fn configuration_errors_end_the_chat() {
        let err = RagError::Config(ConfigError::MissingApiKey("GEMINI_API_KEY".to_string()));
        assert!(report_chat_error(err).is_err());
    }
}
