//! Typed configuration surface for SmartRAG (spec §6 Configuration).
//!
//! Loaded from a TOML file with environment overrides layered on top
//! (`SMARTRAG_` prefix, double-underscore nesting, e.g.
//! `SMARTRAG_SEARCH__SEMANTIC_SCORING_WEIGHT`).

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a failed AI provider call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum RetryPolicy {
    /// Never retry; surface the failure immediately.
    None,
    /// Delay doubles after each attempt.
    #[default]
    ExponentialBackoff,
    /// Delay grows linearly with attempt number.
    LinearBackoff,
    /// Same delay between every attempt.
    FixedDelay,
}

/// Per-source feature toggles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Features {
    /// Enable MCP-backed document search.
    pub enable_mcp_search: bool,
    /// Enable retrieval over transcribed-audio chunks.
    pub enable_audio_search: bool,
    /// Enable retrieval over OCR-extracted-image chunks.
    pub enable_image_search: bool,
    /// Enable the filesystem watcher that re-ingests changed documents.
    pub enable_file_watcher: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            enable_mcp_search: false,
            enable_audio_search: true,
            enable_image_search: true,
            enable_file_watcher: false,
        }
    }
}

/// Chunking and hybrid-search tuning (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchConfig {
    /// Upper bound on chunk length in characters.
    pub max_chunk_size: usize,
    /// Lower bound on chunk length; undersized tail fragments merge into the previous chunk.
    pub min_chunk_size: usize,
    /// Overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Weight of the semantic (embedding) half of the hybrid score.
    pub semantic_scoring_weight: f32,
    /// Weight of the keyword half of the hybrid score.
    pub keyword_scoring_weight: f32,
    /// Minimum hybrid score to admit a chunk (adaptive: lowered toward a floor if too few pass).
    pub semantic_search_threshold: f32,
    /// Top-1 hybrid score above which the searcher reports a strong match (router early-exit signal).
    pub strong_document_match_threshold: f32,
    /// Minimum number of passing results before the adaptive threshold is lowered.
    pub min_results: usize,
    /// Maximum number of results returned.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 200,
            chunk_overlap: 100,
            semantic_scoring_weight: 0.8,
            keyword_scoring_weight: 0.2,
            semantic_search_threshold: 0.5,
            strong_document_match_threshold: 0.85,
            min_results: 3,
            max_results: 10,
        }
    }
}

impl SearchConfig {
    /// Validates that the two scoring weights sum to 1.0 (within floating-point tolerance).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the weights do not sum to 1.0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.semantic_scoring_weight + self.keyword_scoring_weight;
        if (sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::InvalidValue {
                field: "semantic_scoring_weight + keyword_scoring_weight".to_string(),
                reason: format!("must sum to 1.0, got {sum}"),
            });
        }
        if self.min_chunk_size >= self.max_chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "min_chunk_size".to_string(),
                reason: "must be smaller than max_chunk_size".to_string(),
            });
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "chunk_overlap".to_string(),
                reason: "must be smaller than max_chunk_size".to_string(),
            });
        }
        Ok(())
    }
}

/// Retry tuning for AI provider calls (spec §6, §7 `AIProviderError`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetryConfig {
    /// Maximum attempts before giving up (includes the first attempt).
    pub max_retry_attempts: u32,
    /// Base delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Backoff shape applied to `retry_delay_ms` across attempts.
    pub retry_policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_delay_ms: 250,
            retry_policy: RetryPolicy::ExponentialBackoff,
        }
    }
}

impl RetryConfig {
    /// Computes the delay before the given attempt (0-based), per `retry_policy`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let millis = match self.retry_policy {
            RetryPolicy::None => 0,
            RetryPolicy::FixedDelay => self.retry_delay_ms,
            RetryPolicy::LinearBackoff => self.retry_delay_ms * u64::from(attempt + 1),
            RetryPolicy::ExponentialBackoff => self.retry_delay_ms.saturating_mul(1 << attempt.min(16)),
        };
        std::time::Duration::from_millis(millis)
    }
}

/// Root configuration for a SmartRAG instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmartRagConfig {
    /// Chunking and hybrid-search tuning.
    pub search: SearchConfig,
    /// AI provider retry tuning.
    pub retry: RetryConfig,
    /// Whether a fallback AI provider chain is consulted on permanent failure.
    pub enable_fallback_providers: bool,
    /// Ordered fallback provider names, consulted in order when the primary fails.
    pub fallback_providers: Vec<String>,
    /// Per-source feature toggles.
    pub features: Features,
    /// ISO 639-1 language applied to chunks that lack their own language tag.
    pub default_language: String,
    /// Run schema registry initialization for all configured databases at startup.
    pub enable_auto_schema_analysis: bool,
}

impl Default for SmartRagConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            enable_fallback_providers: false,
            fallback_providers: Vec::new(),
            features: Features::default(),
            default_language: "en".to_string(),
            enable_auto_schema_analysis: true,
        }
    }
}

impl SmartRagConfig {
    /// Loads configuration from a TOML file, falling back to defaults for absent fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the file content is not valid TOML, or
    /// wraps the validation error from [`Self::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field invariants that `Default`/serde cannot express alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if any invariant is violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        if self.enable_fallback_providers && self.fallback_providers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fallback_providers".to_string(),
                reason: "enable_fallback_providers is set but no fallback providers are configured".to_string(),
            });
        }
        if self.default_language.len() != 2 {
            return Err(ConfigError::InvalidValue {
                field: "default_language".to_string(),
                reason: "must be an ISO 639-1 two-letter code".to_string(),
            });
        }
        Ok(())
    }
}
