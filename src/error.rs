//! Error types for SmartRAG operations.
//!
//! This module provides a layered error hierarchy using `thiserror`. Each
//! stage of the query pipeline (schema analysis, AI calls, SQL generation,
//! database execution, merging) gets its own sub-error enum; the top-level
//! [`Error`] wraps each via `#[from]` so `?` composes across stage boundaries.
//! See spec §7 for the propagation policy each variant corresponds to.

use thiserror::Error;

/// Result type alias for SmartRAG operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for SmartRAG operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is invalid or missing required fields. Fatal: refused at startup.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Schema analysis failed for one database. Never fatal to the whole
    /// request; the offending database is marked `Failed` and routing
    /// continues around it (spec §7).
    #[error("schema analysis error: {0}")]
    Schema(#[from] SchemaError),

    /// The configured AI provider failed to respond.
    #[error("AI provider error: {0}")]
    AiProvider(#[from] AiProviderError),

    /// SQL generation could not produce a safe, valid statement after retries.
    #[error("SQL generation error: {0}")]
    SqlGeneration(#[from] SqlGenerationError),

    /// A database query failed during execution. Captured per-database in
    /// `DbResult` rather than aborting the whole router call (spec §4.5).
    #[error("database execution error: {0}")]
    DbExecution(#[from] DbExecutionError),

    /// No evidence (database rows or document chunks) was found for the query.
    /// Not treated as a failure: the router returns [`crate::model::Answer::not_found`].
    #[error("no answer found")]
    NotFound,

    /// The operation was cancelled via its `CancellationToken` before completing.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

/// Configuration-layer errors (spec §7 `ConfigurationError`, fatal).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field was absent.
    #[error("missing configuration field: {field}")]
    MissingField {
        /// The field name.
        field: String,
    },

    /// A field's value failed validation.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// The config file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Schema analysis errors (spec §7 `SchemaAnalysisError`, per-database, non-fatal).
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The database could not be reached.
    #[error("database {database_id} unreachable: {reason}")]
    Unreachable {
        /// The database that could not be reached.
        database_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// Authentication against the database failed.
    #[error("authentication failed for database {database_id}")]
    AuthFailed {
        /// The database whose credentials were rejected.
        database_id: String,
    },

    /// A metadata introspection query failed.
    #[error("metadata query failed for database {database_id}: {reason}")]
    IntrospectionFailed {
        /// The database being introspected.
        database_id: String,
        /// Underlying reason.
        reason: String,
    },
}

/// AI provider errors (spec §7 `AIProviderError`).
#[derive(Error, Debug)]
pub enum AiProviderError {
    /// A transient failure (timeout, rate limit, transport error); safe to retry.
    #[error("transient AI provider error: {0}")]
    Transient(String),

    /// A permanent failure (auth rejected, model unavailable, bad request); retrying will not help.
    #[error("permanent AI provider error: {0}")]
    Permanent(String),

    /// The provider returned a response that did not match the expected shape.
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
}

/// SQL generation errors (spec §7 `SqlGenerationError`).
#[derive(Error, Debug)]
pub enum SqlGenerationError {
    /// No dialect strategy is registered for the requested database type.
    #[error("no SQL dialect strategy for {dialect}")]
    UnsupportedDialect {
        /// The dialect name that has no strategy.
        dialect: String,
    },

    /// The generated statement failed safety or syntax validation after all retries.
    #[error("SQL validation failed after {attempts} attempt(s): {reason}")]
    ValidationFailed {
        /// Number of attempts made.
        attempts: u32,
        /// The last validation failure reason.
        reason: String,
    },

    /// The statement referenced a table or column absent from the schema.
    #[error("generated SQL references unknown identifier: {identifier}")]
    UnknownIdentifier {
        /// The unresolved identifier.
        identifier: String,
    },
}

/// Database execution errors (spec §7 `DbExecutionError`, captured in `DbResult`).
#[derive(Error, Debug)]
pub enum DbExecutionError {
    /// The connection pool had no available connections within the configured wait.
    #[error("connection pool exhausted for database {database_id}")]
    PoolExhausted {
        /// The database whose pool was exhausted.
        database_id: String,
    },

    /// The query exceeded its configured timeout.
    #[error("query timed out after {millis}ms")]
    Timeout {
        /// The timeout that was exceeded, in milliseconds.
        millis: u64,
    },

    /// The underlying driver returned an error.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Embedding-provider errors (feature-gated backends: `fastembed-embeddings`).
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The embedding model failed to load or initialize.
    #[error("embedding model initialization failed: {0}")]
    ModelInit(String),

    /// A single embed or batch-embed call failed.
    #[error("embedding failed: {0}")]
    EmbedFailed(String),

    /// The input text was empty or otherwise unembeddable.
    #[error("invalid embedding input: {reason}")]
    InvalidInput {
        /// Why the input could not be embedded.
        reason: String,
    },
}

// Implement From traits for third-party errors.

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<EmbeddingError> for Error {
    fn from(err: EmbeddingError) -> Self {
        Self::AiProvider(AiProviderError::Permanent(err.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_cancelled_display() {
        assert_eq!(Error::NotFound.to_string(), "no answer found");
        let err = Error::Cancelled("router query".to_string());
        assert_eq!(err.to_string(), "operation cancelled: router query");
    }

    #[test]
    fn test_config_error_variants() {
        let err = ConfigError::MissingField {
            field: "semantic_scoring_weight".to_string(),
        };
        assert!(err.to_string().contains("semantic_scoring_weight"));

        let err = ConfigError::InvalidValue {
            field: "keyword_scoring_weight".to_string(),
            reason: "weights must sum to 1.0".to_string(),
        };
        assert!(err.to_string().contains("must sum to 1.0"));

        let err = ConfigError::Parse("unexpected token".to_string());
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_schema_error_is_per_database_not_fatal_to_error_enum() {
        let err = SchemaError::Unreachable {
            database_id: "orders_db".to_string(),
            reason: "connection refused".to_string(),
        };
        let wrapped: Error = err.into();
        assert!(matches!(wrapped, Error::Schema(_)));

        let err = SchemaError::AuthFailed {
            database_id: "orders_db".to_string(),
        };
        assert!(err.to_string().contains("orders_db"));

        let err = SchemaError::IntrospectionFailed {
            database_id: "orders_db".to_string(),
            reason: "PRAGMA failed".to_string(),
        };
        assert!(err.to_string().contains("PRAGMA failed"));
    }

    #[test]
    fn test_ai_provider_error_variants() {
        let err = AiProviderError::Transient("timed out".to_string());
        assert!(err.to_string().contains("transient"));

        let err = AiProviderError::Permanent("invalid api key".to_string());
        assert!(err.to_string().contains("permanent"));

        let err = AiProviderError::MalformedResponse("missing field".to_string());
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_sql_generation_error_variants() {
        let err = SqlGenerationError::ValidationFailed {
            attempts: 3,
            reason: "forbidden keyword DROP".to_string(),
        };
        assert!(err.to_string().contains("3 attempt"));
        assert!(err.to_string().contains("DROP"));

        let err = SqlGenerationError::UnsupportedDialect {
            dialect: "Oracle".to_string(),
        };
        assert!(err.to_string().contains("Oracle"));

        let err = SqlGenerationError::UnknownIdentifier {
            identifier: "ghost_table".to_string(),
        };
        assert!(err.to_string().contains("ghost_table"));
    }

    #[test]
    fn test_db_execution_error_variants() {
        let err = DbExecutionError::Timeout { millis: 5000 };
        assert!(err.to_string().contains("5000ms"));

        let err = DbExecutionError::PoolExhausted {
            database_id: "orders_db".to_string(),
        };
        assert!(err.to_string().contains("orders_db"));

        let err = DbExecutionError::Driver("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_embedding_error_variants() {
        let err = EmbeddingError::ModelInit("failed to download weights".to_string());
        assert!(err.to_string().contains("failed to download weights"));

        let err = EmbeddingError::EmbedFailed("ONNX runtime panic".to_string());
        assert!(err.to_string().contains("ONNX runtime panic"));

        let err = EmbeddingError::InvalidInput {
            reason: "empty text".to_string(),
        };
        assert!(err.to_string().contains("empty text"));

        let wrapped: Error = EmbeddingError::EmbedFailed("boom".to_string()).into();
        assert!(matches!(wrapped, Error::AiProvider(AiProviderError::Permanent(_))));
    }

    #[test]
    fn test_toml_parse_error_to_config_error() {
        let result: std::result::Result<toml::Value, _> = toml::from_str("not = [valid");
        let toml_err = result.unwrap_err();
        let err: ConfigError = toml_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
