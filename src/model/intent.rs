//! `Intent`: the output of intent analysis — which sources to consult and how.

use serde::{Deserialize, Serialize};

/// Routing strategy selected from intent confidence (see [`crate::intent_analyzer`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Strategy {
    /// Consult only configured databases.
    DatabaseOnly,
    /// Consult only the document index.
    DocumentOnly,
    /// Consult both, in parallel.
    Hybrid,
}

/// One database's slice of an [`Intent`]: which tables to query and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseQueryIntent {
    /// Target database id.
    pub database_id: String,
    /// Tables required to answer the query, in the schema's exact casing.
    pub required_tables: Vec<String>,
    /// Short natural-language purpose text (a hint for the SQL generator, not SQL itself).
    pub purpose: String,
    /// Relative priority among database targets (higher runs/matters first).
    pub priority: u8,
    /// Non-English characters were found in `purpose` or a requested identifier;
    /// the SQL generator should flag this in its retry prompt (spec §4.3).
    pub has_non_english_hint: bool,
}

/// The output of intent analysis: a plan of which sources to consult.
///
/// Invariant (enforced by [`crate::intent_analyzer::IntentAnalyzer::validate`]):
/// after validation every `(database_id, table)` pair named here exists in
/// the schema registry under that exact `database_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// The original user query, verbatim.
    pub query: String,
    /// Per-database query intents, post-validation.
    pub database_intents: Vec<DatabaseQueryIntent>,
    /// Confidence in [0, 1] that databases (as opposed to documents) are relevant.
    pub confidence: f32,
    /// Strategy selected from `confidence` (see §4.3 thresholds).
    pub strategy: Strategy,
    /// Set if the AI explicitly returned the `[NO_ANSWER_FOUND]` negation pattern.
    pub explicit_negation: bool,
}

impl Intent {
    /// Returns `true` if at least one database target remains after validation.
    #[must_use]
    pub fn has_database_targets(&self) -> bool {
        !self.database_intents.is_empty()
    }

    /// Selects a [`Strategy`] from a confidence score per spec §4.3's rule table.
    ///
    /// - c >= 0.7 and >=1 DB target remains -> `DatabaseOnly`.
    /// - c >= 0.7 and no DB targets -> `DocumentOnly`.
    /// - 0.3 <= c < 0.7 -> `Hybrid`.
    /// - c < 0.3 -> `DocumentOnly` (fallback).
    #[must_use]
    pub fn select_strategy(confidence: f32, has_database_targets: bool) -> Strategy {
        if confidence >= 0.7 {
            if has_database_targets {
                Strategy::DatabaseOnly
            } else {
                Strategy::DocumentOnly
            }
        } else if confidence >= 0.3 {
            Strategy::Hybrid
        } else {
            Strategy::DocumentOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_high_confidence_with_targets_is_database_only() {
        assert_eq!(Intent::select_strategy(0.9, true), Strategy::DatabaseOnly);
    }

    #[test]
    fn strategy_high_confidence_without_targets_is_document_only() {
        assert_eq!(Intent::select_strategy(0.9, false), Strategy::DocumentOnly);
    }

    #[test]
    fn strategy_mid_confidence_is_hybrid() {
        assert_eq!(Intent::select_strategy(0.5, true), Strategy::Hybrid);
        assert_eq!(Intent::select_strategy(0.3, false), Strategy::Hybrid);
    }

    #[test]
    fn strategy_low_confidence_falls_back_to_document_only() {
        assert_eq!(Intent::select_strategy(0.1, true), Strategy::DocumentOnly);
    }

    #[test]
    fn strategy_boundary_at_0_7_is_database_leaning() {
        assert_eq!(Intent::select_strategy(0.7, true), Strategy::DatabaseOnly);
        assert_eq!(Intent::select_strategy(0.69_999, true), Strategy::Hybrid);
    }
}
