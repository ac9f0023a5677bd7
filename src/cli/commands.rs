//! CLI command implementations.
//!
//! Wires the library's collaborators together for the development harness:
//! config load, optional document ingestion, optional SQLite registration,
//! and one end-to-end query against the reference in-memory backends.

use crate::ai::{AiProvider, MockAiProvider};
use crate::chunking::{DocumentChunker, SentenceAwareChunker};
use crate::cli::output::{OutputFormat, format_answer, format_config};
use crate::cli::parser::{Cli, Commands};
use crate::config::SmartRagConfig;
use crate::conversation::{ConversationStore, InMemoryConversationStore};
use crate::document_repo::{DocumentRepository, InMemoryDocumentRepository, SearchFilters, document_with_metadata};
use crate::executor::{DatabaseExecutor, DbConnector, SqliteConnector, dialect_key};
use crate::model::{ContentType, Dialect};
use crate::router::{QueryIntelligenceRouter, QueryOptions};
use crate::schema_registry::{DatabaseConnectionConfig, SchemaIntrospector, SchemaRegistry, SqliteIntrospector};
use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Loads the effective configuration and dispatches `cli.command`.
///
/// # Errors
///
/// Returns an error if the configuration file fails to parse/validate, a
/// requested document cannot be read, or chunking fails.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::ShowConfig => Ok(format_config(&config, format)),
        Commands::Query {
            query,
            documents,
            sqlite_databases,
            session,
            language,
            max_results,
        } => {
            cmd_query(
                config,
                query,
                documents,
                sqlite_databases,
                session.as_deref(),
                language.as_deref(),
                *max_results,
                format,
            )
            .await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SmartRagConfig> {
    path.map_or_else(
        || Ok(SmartRagConfig::default()),
        |path| SmartRagConfig::load(path).with_context(|| format!("loading configuration from {}", path.display())),
    )
}

#[allow(clippy::too_many_arguments)]
async fn cmd_query(
    config: SmartRagConfig,
    query: &str,
    documents: &[PathBuf],
    sqlite_databases: &[PathBuf],
    session: Option<&str>,
    language: Option<&str>,
    max_results: Option<usize>,
    format: OutputFormat,
) -> Result<String> {
    let repo = Arc::new(InMemoryDocumentRepository::new());
    let ai_provider: Arc<dyn AiProvider> = Arc::new(MockAiProvider::new(crate::embedding::DEFAULT_DIMENSIONS));

    ingest_documents(&repo, &ai_provider, documents, &config).await?;

    let registry = Arc::new(build_schema_registry(sqlite_databases));
    if config.enable_auto_schema_analysis {
        registry.initialize().await;
    }

    let mut connectors: HashMap<String, Arc<dyn DbConnector>> = HashMap::new();
    connectors.insert(dialect_key(Dialect::Sqlite), Arc::new(SqliteConnector::new()));
    let executor = DatabaseExecutor::new(connectors, Duration::from_secs(30));

    let conversation_store = Arc::new(InMemoryConversationStore::new());
    let session_id = session.map_or_else(|| conversation_store.start_new_session(), str::to_string);

    let router = QueryIntelligenceRouter::new(config, registry, repo, conversation_store, ai_provider, executor);

    let options = QueryOptions {
        max_results,
        preferred_language: language.map(str::to_string),
        filters: SearchFilters::default(),
    };

    info!(session_id = %session_id, "running query");
    let answer = router.query(query, &session_id, options, CancellationToken::new()).await;
    Ok(format_answer(&answer, format))
}

fn build_schema_registry(sqlite_databases: &[PathBuf]) -> SchemaRegistry {
    let connections: Vec<DatabaseConnectionConfig> = sqlite_databases
        .iter()
        .map(|path| DatabaseConnectionConfig {
            name: Some(path.display().to_string()),
            connection_string: path.display().to_string(),
            dialect: Dialect::Sqlite,
            enabled: true,
            included_tables: Vec::new(),
            excluded_tables: Vec::new(),
            max_rows_per_query: 100,
            cross_database_mappings: Vec::new(),
            description: None,
        })
        .collect();
    let introspectors: Vec<Arc<dyn SchemaIntrospector>> = vec![Arc::new(SqliteIntrospector::new())];
    SchemaRegistry::new(connections, introspectors)
}

async fn ingest_documents(
    repo: &Arc<InMemoryDocumentRepository>,
    ai_provider: &Arc<dyn AiProvider>,
    documents: &[PathBuf],
    config: &SmartRagConfig,
) -> Result<()> {
    let chunker = SentenceAwareChunker::new();
    for path in documents {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading document {}", path.display()))?;
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let document_id = filename.clone();

        let mut chunks = chunker.chunk(&document_id, &text, ContentType::Document, &config.search)?;
        for chunk in &mut chunks {
            chunk.tokenize();
            let embedding = ai_provider.generate_embedding(&chunk.content).await?;
            chunk.embedding = Some(embedding);
        }

        let mut document = document_with_metadata(document_id, filename);
        for chunk in &chunks {
            document.push_chunk(chunk.id.clone());
        }
        repo.put_document(document).await;
        repo.upsert_batch(chunks).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parser::Cli;
    use clap::Parser;
    use std::io::Write as _;

    #[tokio::test]
    async fn show_config_prints_defaults() {
        let cli = Cli::parse_from(["smartrag-cli", "show-config"]);
        let output = execute(&cli).await.unwrap();
        assert!(output.contains("Default language"));
    }

    #[tokio::test]
    async fn query_with_no_evidence_reports_not_found() {
        let cli = Cli::parse_from(["smartrag-cli", "query", "what is the meaning of life?"]);
        let output = execute(&cli).await.unwrap();
        assert!(output.contains(crate::model::NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn query_ingests_a_document_and_reports_no_sql_generation_without_a_real_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Paris is the capital of France.").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["smartrag-cli", "query", "-d", &path, "what is the capital of France?"]);
        let output = execute(&cli).await.unwrap();
        assert!(!output.is_empty());
    }

    #[tokio::test]
    async fn unreadable_document_path_is_an_error() {
        let cli = Cli::parse_from(["smartrag-cli", "query", "-d", "/nonexistent/path.txt", "anything"]);
        assert!(execute(&cli).await.is_err());
    }
}
