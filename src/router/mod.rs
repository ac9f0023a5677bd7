//! Query Intelligence Router (spec §4.8): orchestrates intent analysis,
//! document search, SQL generation/execution/merging, and answer synthesis
//! for a single request.

use crate::ai::AiProvider;
use crate::config::SmartRagConfig;
use crate::conversation::ConversationStore;
use crate::document_repo::{DocumentRepository, SearchFilters};
use crate::executor::{DatabaseExecutor, DbQuery, dialect_key};
use crate::intent_analyzer::IntentAnalyzer;
use crate::merger::ResultMerger;
use crate::model::{Answer, DbResult, Intent, MergedEvidence, Role, SchemaStatus, Strategy};
use crate::schema_registry::SchemaRegistry;
use crate::search::hybrid::{HybridSearchResult, search_chunks};
use crate::sql::SqlGenerator;
use crate::synthesizer::AnswerSynthesizer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Per-request options accepted by [`QueryIntelligenceRouter::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Maximum chunks to retrieve from the document index.
    pub max_results: Option<usize>,
    /// Preferred reply language, if the caller wants to override the query's own language.
    pub preferred_language: Option<String>,
    /// Content-type filters applied to document search.
    pub filters: SearchFilters,
}

/// Orchestrates a single query end to end (spec §4.8).
pub struct QueryIntelligenceRouter {
    config: SmartRagConfig,
    schema_registry: Arc<SchemaRegistry>,
    document_repo: Arc<dyn DocumentRepository>,
    conversation_store: Arc<dyn ConversationStore>,
    intent_analyzer: IntentAnalyzer,
    sql_generator: SqlGenerator,
    executor: DatabaseExecutor,
    synthesizer: AnswerSynthesizer,
    ai_provider: Arc<dyn AiProvider>,
}

impl QueryIntelligenceRouter {
    /// Assembles a router from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SmartRagConfig,
        schema_registry: Arc<SchemaRegistry>,
        document_repo: Arc<dyn DocumentRepository>,
        conversation_store: Arc<dyn ConversationStore>,
        ai_provider: Arc<dyn AiProvider>,
        executor: DatabaseExecutor,
    ) -> Self {
        Self {
            intent_analyzer: IntentAnalyzer::new(ai_provider.clone()),
            sql_generator: SqlGenerator::new(ai_provider.clone(), config.retry),
            synthesizer: AnswerSynthesizer::new(ai_provider.clone()),
            config,
            schema_registry,
            document_repo,
            conversation_store,
            executor,
            ai_provider,
        }
    }

    /// Answers `query` within `session_id`, per spec §4.8's full sequence.
    #[instrument(name = "query_intelligence", skip(self, query, options), fields(session_id = %session_id))]
    pub async fn query(&self, query: &str, session_id: &str, options: QueryOptions, cancel: CancellationToken) -> Answer {
        self.conversation_store.append_turn(session_id, Role::User, query).await;

        let answer = self.query_inner(query, session_id, &options, cancel).await;

        self.conversation_store.append_turn(session_id, Role::Assistant, &answer.answer).await;
        answer
    }

    async fn query_inner(&self, query: &str, session_id: &str, options: &QueryOptions, cancel: CancellationToken) -> Answer {
        let history = self.conversation_store.get_recent(session_id, 10).await;
        let schemas = self.schema_registry.get_all();

        let (intent, doc_search) = tokio::join!(
            self.analyze_intent(query, &schemas, &history),
            self.search_documents(query, options)
        );

        if intent.explicit_negation {
            info!("explicit negation returned by intent analyzer; short-circuiting");
            return Answer::not_found(query);
        }

        match intent.strategy {
            Strategy::DocumentOnly => self.answer_from_documents(query, &doc_search, options).await,
            Strategy::DatabaseOnly => self.answer_from_database(query, &intent, options, cancel).await,
            Strategy::Hybrid => {
                if doc_search.strong && intent.confidence < 0.85 {
                    info!("early-exit: strong document match with sub-threshold db confidence");
                    return self.answer_from_documents(query, &doc_search, options).await;
                }
                self.answer_hybrid(query, &intent, &doc_search, options, cancel).await
            }
        }
    }

    #[instrument(skip(self, query, schemas, history))]
    async fn analyze_intent(&self, query: &str, schemas: &[crate::model::DatabaseSchema], history: &[crate::model::ConversationTurn]) -> Intent {
        match self.intent_analyzer.analyze(query, schemas, history).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(error = %err, "intent analysis failed; falling back to document-only");
                Intent {
                    query: query.to_string(),
                    database_intents: Vec::new(),
                    confidence: 0.0,
                    strategy: Strategy::DocumentOnly,
                    explicit_negation: false,
                }
            }
        }
    }

    async fn search_documents(&self, query: &str, options: &QueryOptions) -> HybridSearchResult {
        let embedding = self.ai_provider.generate_embedding(query).await.ok();
        let candidates = self.document_repo.get_all().await;
        let candidates: Vec<_> = candidates.into_iter().filter(|c| options.filters.admits(c)).collect();
        let mut result = search_chunks(query, embedding.as_deref(), &candidates, &self.config.search);
        if let Some(max) = options.max_results {
            result.chunks.truncate(max);
        }
        result
    }

    async fn answer_from_documents(&self, query: &str, doc_search: &HybridSearchResult, options: &QueryOptions) -> Answer {
        if !doc_search.strong && doc_search.chunks.iter().all(|c| c.score < doc_search.threshold_applied) {
            return Answer::not_found(query);
        }
        let evidence = MergedEvidence {
            database_text: String::new(),
            database_row_count: 0,
            chunks: doc_search.chunks.clone(),
            strong_document_match: doc_search.strong,
            used_join_hints: false,
        };
        self.synthesize(query, &evidence, &[], options).await
    }

    #[instrument(skip(self, query, intent, options, cancel))]
    async fn answer_from_database(&self, query: &str, intent: &Intent, options: &QueryOptions, cancel: CancellationToken) -> Answer {
        let (evidence, db_results) = self.run_database_branch(query, intent, Vec::new(), cancel).await;
        self.synthesize(query, &evidence, &db_results, options).await
    }

    async fn answer_hybrid(
        &self,
        query: &str,
        intent: &Intent,
        doc_search: &HybridSearchResult,
        options: &QueryOptions,
        cancel: CancellationToken,
    ) -> Answer {
        let (evidence, db_results) = self.run_database_branch(query, intent, doc_search.chunks.clone(), cancel).await;
        self.synthesize(query, &evidence, &db_results, options).await
    }

    /// Generates SQL, executes it, and merges results for every database
    /// target in `intent`, combined with any already-retrieved `chunks`.
    async fn run_database_branch(
        &self,
        query: &str,
        intent: &Intent,
        chunks: Vec<crate::model::ScoredChunk>,
        cancel: CancellationToken,
    ) -> (MergedEvidence, Vec<DbResult>) {
        if !intent.has_database_targets() {
            return (
                MergedEvidence {
                    database_text: String::new(),
                    database_row_count: 0,
                    chunks,
                    strong_document_match: false,
                    used_join_hints: false,
                },
                Vec::new(),
            );
        }

        let mut queries = Vec::new();
        for db_intent in &intent.database_intents {
            let Some(schema) = self.schema_registry.get(&db_intent.database_id) else {
                continue;
            };
            if !matches!(schema.status, SchemaStatus::Ready) {
                continue;
            }
            let Some(config) = self.schema_registry.connection_config(&db_intent.database_id) else {
                continue;
            };

            match self.generate_sql(query, db_intent, &schema).await {
                Ok(sql) => queries.push((
                    DbQuery {
                        database_id: db_intent.database_id.clone(),
                        connection_string: config.connection_string.clone(),
                        sql,
                        max_rows: config.max_rows_per_query,
                    },
                    dialect_key(schema.dialect),
                )),
                Err(err) => warn!(database_id = %db_intent.database_id, error = %err, "SQL generation failed for database target"),
            }
        }

        let db_results = self.execute_database(queries, cancel.clone()).await;
        let outcome = self.merge_results(db_results.clone(), cancel).await;

        (
            MergedEvidence {
                database_text: outcome.database_text,
                database_row_count: outcome.database_row_count,
                chunks,
                strong_document_match: false,
                used_join_hints: outcome.used_join_hints,
            },
            db_results,
        )
    }

    #[instrument(skip(self, query, db_intent, schema), fields(database_id = %db_intent.database_id))]
    async fn generate_sql(
        &self,
        query: &str,
        db_intent: &crate::model::DatabaseQueryIntent,
        schema: &crate::model::DatabaseSchema,
    ) -> crate::error::Result<String> {
        self.sql_generator.generate(query, db_intent, schema).await
    }

    #[instrument(skip(self, queries, cancel))]
    async fn execute_database(&self, queries: Vec<(DbQuery, String)>, cancel: CancellationToken) -> Vec<DbResult> {
        self.executor.execute_all(queries, cancel).await
    }

    #[instrument(skip(self, results, cancel))]
    async fn merge_results(&self, results: Vec<DbResult>, cancel: CancellationToken) -> crate::merger::MergeOutcome {
        let merger = ResultMerger::new(&self.schema_registry, &self.executor);
        merger.merge(results, cancel).await
    }

    #[instrument(name = "synthesize_answer", skip(self, query, evidence, db_results, options))]
    async fn synthesize(&self, query: &str, evidence: &MergedEvidence, db_results: &[DbResult], options: &QueryOptions) -> Answer {
        match self.synthesizer.synthesize(query, evidence, db_results, options.preferred_language.as_deref()).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "answer synthesis failed");
                Answer::not_found(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiProvider;
    use crate::config::SmartRagConfig;
    use crate::conversation::InMemoryConversationStore;
    use crate::document_repo::InMemoryDocumentRepository;
    use crate::model::{Chunk, ContentType};
    use std::collections::HashMap;
    use std::ops::Range;
    use std::time::Duration;

    fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        let range: Range<usize> = 0..text.len();
        let mut c = Chunk::new(id, "d1", 0, text, range, ContentType::Document).with_embedding(embedding);
        c.tokenize();
        c
    }

    async fn router_with(provider: MockAiProvider) -> QueryIntelligenceRouter {
        let provider = Arc::new(provider);
        let registry = Arc::new(SchemaRegistry::new(Vec::new(), Vec::new()));
        let repo = Arc::new(InMemoryDocumentRepository::new());
        let store = Arc::new(InMemoryConversationStore::new());
        let executor = DatabaseExecutor::new(HashMap::new(), Duration::from_secs(5));
        QueryIntelligenceRouter::new(SmartRagConfig::default(), registry, repo, store, provider, executor)
    }

    #[tokio::test]
    async fn explicit_negation_short_circuits_to_not_found() {
        let provider = MockAiProvider::new(4).with_response("asdf", "[NO_ANSWER_FOUND]");
        let router = router_with(provider).await;
        let answer = router.query("asdf", "s1", QueryOptions::default(), CancellationToken::new()).await;
        assert_eq!(answer.answer, crate::model::NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn no_evidence_at_all_yields_not_found() {
        let provider = MockAiProvider::new(4);
        let router = router_with(provider).await;
        let answer = router.query("what is the meaning of life", "s1", QueryOptions::default(), CancellationToken::new()).await;
        assert_eq!(answer.answer, crate::model::NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn strong_document_match_is_synthesized_from_chunks() {
        let provider = MockAiProvider::new(4).with_response("Paris", "Paris is the capital of France.");
        let provider = Arc::new(provider);
        let registry = Arc::new(SchemaRegistry::new(Vec::new(), Vec::new()));
        let repo = Arc::new(InMemoryDocumentRepository::new());
        repo.upsert(chunk("c1", "Paris is the capital of France.", vec![1.0, 0.0])).await;
        let store = Arc::new(InMemoryConversationStore::new());
        let executor = DatabaseExecutor::new(HashMap::new(), Duration::from_secs(5));
        let mut config = SmartRagConfig::default();
        config.search.semantic_search_threshold = 0.01;
        config.search.strong_document_match_threshold = 0.01;
        let router = QueryIntelligenceRouter::new(config, registry, repo, store, provider, executor);

        let answer = router.query("what is the capital of Paris", "s1", QueryOptions::default(), CancellationToken::new()).await;
        assert!(!answer.sources.is_empty());
    }

    #[tokio::test]
    async fn appends_user_and_assistant_turns_to_conversation_store() {
        let provider = MockAiProvider::new(4);
        let router = router_with(provider).await;
        let store = router.conversation_store.clone();
        let _ = router.query("hello", "s1", QueryOptions::default(), CancellationToken::new()).await;
        let turns = store.get_recent("s1", 10).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }
}
