//! Command-line argument parsing.
//!
//! Defines the CLI structure for the development harness using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SmartRAG development harness: exercises the library end to end against
/// its reference in-memory backends — not a product front-end, and it does
/// not define any wire protocol.
#[derive(Parser, Debug)]
#[command(name = "smartrag-cli")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML configuration file; falls back to `SmartRagConfig::default()`.
    #[arg(short, long, env = "SMARTRAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug-level tracing output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration (defaults merged with `--config`).
    #[command(name = "show-config")]
    ShowConfig,

    /// Ingest documents and/or SQLite databases, then answer one query
    /// end to end against the reference in-memory backends.
    Query {
        /// The natural-language question to answer.
        query: String,

        /// Text file(s) to chunk, embed, and ingest into the document index before querying.
        #[arg(short = 'd', long = "document")]
        documents: Vec<PathBuf>,

        /// SQLite database file(s) to introspect and register as query targets.
        #[arg(long = "sqlite-db")]
        sqlite_databases: Vec<PathBuf>,

        /// Conversation session id; a fresh one is minted if omitted.
        #[arg(long)]
        session: Option<String>,

        /// Preferred reply language (ISO 639-1), overriding the query's own language.
        #[arg(long)]
        language: Option<String>,

        /// Maximum chunks retrieved from the document index.
        #[arg(long)]
        max_results: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_requires_the_question_argument() {
        let result = Cli::try_parse_from(["smartrag-cli", "query"]);
        assert!(result.is_err());
    }

    #[test]
    fn query_parses_repeated_document_flags() {
        let cli = Cli::try_parse_from([
            "smartrag-cli",
            "query",
            "-d",
            "a.txt",
            "-d",
            "b.txt",
            "what is in the documents?",
        ])
        .unwrap();
        let Commands::Query { documents, query, .. } = cli.command else {
            panic!("expected Query command");
        };
        assert_eq!(documents.len(), 2);
        assert_eq!(query, "what is in the documents?");
    }

    #[test]
    fn show_config_takes_no_arguments() {
        let cli = Cli::try_parse_from(["smartrag-cli", "show-config"]).unwrap();
        assert!(matches!(cli.command, Commands::ShowConfig));
    }

    #[test]
    fn format_defaults_to_text() {
        let cli = Cli::try_parse_from(["smartrag-cli", "show-config"]).unwrap();
        assert_eq!(cli.format, "text");
    }
}
