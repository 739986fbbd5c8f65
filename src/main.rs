use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rag_chat::commands::{
    ask_question, ingest_source, run_chat, run_talk, show_status, summarize_news,
    summarize_video, write_email, write_notes,
};
use rag_chat::config::{Config, run_interactive_config, show_config};
use rag_chat::ingest::{ChunkingConfig, DEFAULT_FEED_LIMIT};
use rag_chat::tasks::{EmailCategory, NewsCategory};

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Chat with your documents, feeds and videos using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure providers, chunking and retrieval
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a text file, PDF, RSS/Atom feed or YouTube URL into the vector store
    Ingest {
        source: String,
        /// Characters per chunk (defaults to the configured value)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive chunks
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ask a single question about the ingested documents
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(short)]
        k: Option<usize>,
    },
    /// Interactive chat over the ingested documents
    Chat {
        #[arg(short)]
        k: Option<usize>,
    },
    /// Show vector store and provider status
    Status,
    /// Summarize today's headlines
    News {
        #[arg(long, value_enum, default_value_t = NewsCategory::Tech)]
        category: NewsCategory,
        #[arg(long, default_value_t = DEFAULT_FEED_LIMIT)]
        limit: usize,
    },
    /// Summarize a YouTube video transcript
    Transcript { url: String },
    /// Generate markdown notes on a topic
    Notes {
        topic: String,
        /// Write the notes to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Draft an email from a topic or key points
    Email {
        topic: String,
        #[arg(long, value_enum, default_value_t = EmailCategory::Business)]
        category: EmailCategory,
    },
    /// Chat with memory, without document retrieval
    Talk,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Config { show } = cli.command {
        if show {
            show_config()?;
        } else {
            run_interactive_config()?;
        }
        return Ok(());
    }

    let config = Config::load_default()?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest {
            source,
            chunk_size,
            chunk_overlap,
        } => {
            let chunking = ChunkingConfig::new(
                chunk_size.unwrap_or(config.chunking.chunk_size),
                chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
            );
            ingest_source(&config, &source, chunking).await?;
        }
        Commands::Ask { question, k } => {
            ask_question(&config, &question, k).await?;
        }
        Commands::Chat { k } => {
            run_chat(&config, k).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::News { category, limit } => {
            summarize_news(&config, category, limit)?;
        }
        Commands::Transcript { url } => {
            summarize_video(&config, &url)?;
        }
        Commands::Notes { topic, output } => {
            write_notes(&config, &topic, output.as_deref())?;
        }
        Commands::Email { topic, category } => {
            write_email(&config, &topic, category)?;
        }
        Commands::Talk => {
            run_talk(&config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "rag-chat",
            "ingest",
            "handbook.pdf",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
        ])
        .expect("should parse");

        let Commands::Ingest {
            source,
            chunk_size,
            chunk_overlap,
        } = cli.command
        else {
            panic!("expected ingest command");
        };
        assert_eq!(source, "handbook.pdf");
        assert_eq!(chunk_size, Some(500));
        assert_eq!(chunk_overlap, Some(50));
    }

    #[test]
    fn ask_command_with_k() {
        let cli = Cli::try_parse_from(["rag-chat", "ask", "What is RAG?", "-k", "5"])
            .expect("should parse");

        let Commands::Ask { question, k } = cli.command else {
            panic!("expected ask command");
        };
        assert_eq!(question, "What is RAG?");
        assert_eq!(k, Some(5));
    }

    #[test]
    fn news_defaults() {
        let cli = Cli::try_parse_from(["rag-chat", "news"]).expect("should parse");

        let Commands::News { category, limit } = cli.command else {
            panic!("expected news command");
        };
        assert_eq!(category, NewsCategory::Tech);
        assert_eq!(limit, DEFAULT_FEED_LIMIT);
    }

    #[test]
    fn email_category_values() {
        let cli = Cli::try_parse_from([
            "rag-chat",
            "email",
            "quarterly review",
            "--category",
            "follow-up",
        ])
        .expect("should parse");

        let Commands::Email { category, .. } = cli.command else {
            panic!("expected email command");
        };
        assert_eq!(category, EmailCategory::FollowUp);

        let bad = Cli::try_parse_from(["rag-chat", "email", "x", "--category", "spam"]);
        assert!(bad.is_err());
    }

    #[test]
    fn notes_output_path() {
        let cli = Cli::try_parse_from(["rag-chat", "notes", "ownership", "--output", "notes.md"])
            .expect("should parse");

        let Commands::Notes { output, .. } = cli.command else {
            panic!("expected notes command");
        };
        assert_eq!(output, Some(PathBuf::from("notes.md")));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-chat", "config", "--show"]).expect("should parse");

        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["rag-chat", "serve"]).expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn ask_requires_question() {
        let err = Cli::try_parse_from(["rag-chat", "ask"]).expect_err("should fail");

        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
