//! Result Merger (spec §4.6): fuses per-database [`DbResult`]s into a single
//! [`MergedEvidence`] block for the synthesizer.
//!
//! Pure data-structure code over already-executed results; the only new
//! dependency it pulls in over plain iterator/string logic is for the
//! missing-target retry path, which reuses [`DatabaseExecutor`] and
//! [`SchemaRegistry`] already built for the main execution pass.

use crate::executor::{DatabaseExecutor, DbQuery, dialect_key};
use crate::model::{DbResult, SchemaStatus};
use crate::schema_registry::SchemaRegistry;
use crate::sql::dialect_strategy;
use tokio_util::sync::CancellationToken;

const MIN_ID_SUFFIX: &str = "id";

/// Fuses [`DbResult`]s produced by the [`DatabaseExecutor`] into one tabular
/// evidence block, attempting to join across databases where possible.
pub struct ResultMerger<'a> {
    registry: &'a SchemaRegistry,
    executor: &'a DatabaseExecutor,
}

impl<'a> ResultMerger<'a> {
    /// Creates a merger backed by `registry` (for mapping/dialect lookups)
    /// and `executor` (for the missing-target retry, spec §4.6 step C).
    #[must_use]
    pub const fn new(registry: &'a SchemaRegistry, executor: &'a DatabaseExecutor) -> Self {
        Self { registry, executor }
    }

    /// Merges `results` per spec §4.6 steps A-E.
    pub async fn merge(&self, results: Vec<DbResult>, cancel: CancellationToken) -> MergeOutcome {
        let mut successes: Vec<DbResult> = results.into_iter().filter(|r| r.success && !r.rows.is_empty()).collect();

        if let Some(retry_result) = self.missing_target_retry(&successes, cancel).await {
            successes.push(retry_result);
        }

        if successes.is_empty() {
            return MergeOutcome {
                database_text: String::new(),
                database_row_count: 0,
                used_join_hints: false,
            };
        }

        if successes.len() == 1 {
            let row_count = successes[0].row_count();
            return MergeOutcome {
                database_text: format_table(&successes[0].columns, &successes[0].rows),
                database_row_count: row_count,
                used_join_hints: false,
            };
        }

        if let Some(plan) = self.find_join_plan(&successes) {
            let (columns, rows) = perform_join(&successes, &plan);
            if !rows.is_empty() {
                let row_count = rows.len();
                return MergeOutcome {
                    database_text: format_table(&columns, &rows),
                    database_row_count: row_count,
                    used_join_hints: false,
                };
            }
        }

        let row_count: usize = successes.iter().map(DbResult::row_count).sum();
        MergeOutcome {
            database_text: format_separated_with_hints(&successes),
            database_row_count: row_count,
            used_join_hints: true,
        }
    }

    /// Step B: finds the best join key across `results`, trying operator
    /// mappings, then a shared ID-suffixed column name, then value overlap.
    fn find_join_plan(&self, results: &[DbResult]) -> Option<JoinPlan> {
        self.mapping_join(results).or_else(|| common_name_join(results)).or_else(|| value_overlap_join(results))
    }

    fn mapping_join(&self, results: &[DbResult]) -> Option<JoinPlan> {
        for mapping in self.registry.all_mappings() {
            let source_idx = results
                .iter()
                .position(|r| r.database_id == mapping.source.database_id && r.column_index(&mapping.source.column).is_some());
            let target_idx = results
                .iter()
                .position(|r| r.database_id == mapping.target.database_id && r.column_index(&mapping.target.column).is_some());
            if let (Some(a), Some(b)) = (source_idx, target_idx) {
                if a != b {
                    return Some(JoinPlan::Pairwise {
                        left: a,
                        left_column: mapping.source.column.clone(),
                        right: b,
                        right_column: mapping.target.column.clone(),
                    });
                }
            }
        }
        None
    }

    /// Step C: if an operator-declared mapping names a target database with
    /// no corresponding result, queries it directly for the missing side.
    ///
    /// Per the resolved Open Question (spec §9): if the target database is
    /// unreachable (`SchemaStatus::Failed`), the retry is skipped and the
    /// caller falls through to join hints, rather than erroring.
    async fn missing_target_retry(&self, successes: &[DbResult], cancel: CancellationToken) -> Option<DbResult> {
        for mapping in self.registry.all_mappings() {
            let source = successes.iter().find(|r| {
                r.database_id == mapping.source.database_id && r.column_index(&mapping.source.column).is_some()
            });
            let target_present = successes.iter().any(|r| r.database_id == mapping.target.database_id);
            let (Some(source), false) = (source, target_present) else {
                continue;
            };

            let Some(target_schema) = self.registry.get(&mapping.target.database_id) else {
                continue;
            };
            if !matches!(target_schema.status, SchemaStatus::Ready) {
                continue;
            }
            let Some(target_config) = self.registry.connection_config(&mapping.target.database_id) else {
                continue;
            };
            let Some(target_table) = target_schema.find_table_ci(&mapping.target.table) else {
                continue;
            };

            let col_idx = source.column_index(&mapping.source.column)?;
            let ids: Vec<String> = source
                .rows
                .iter()
                .filter_map(|row| row.get(col_idx))
                .filter(|v| is_numeric(v))
                .map(std::string::ToString::to_string)
                .collect();
            if ids.is_empty() {
                continue;
            }

            let dialect = dialect_strategy(target_schema.dialect);
            let descriptive: Vec<String> =
                target_table.descriptive_columns(5).into_iter().map(|c| c.name.clone()).collect();
            let mut select_cols = vec![mapping.target.column.clone()];
            select_cols.extend(descriptive);
            let select_list = select_cols.iter().map(|c| dialect.quote_identifier(c)).collect::<Vec<_>>().join(", ");
            let values = ids.join(", ");
            let sql = format!(
                "SELECT {select_list} FROM {} WHERE {} IN ({values})",
                dialect.quote_identifier(&target_table.name),
                dialect.quote_identifier(&mapping.target.column)
            );

            let query = DbQuery {
                database_id: mapping.target.database_id.clone(),
                connection_string: target_config.connection_string.clone(),
                sql,
                max_rows: target_config.max_rows_per_query,
            };
            let results = self
                .executor
                .execute_all(vec![(query, dialect_key(target_schema.dialect))], cancel.clone())
                .await;
            if let Some(result) = results.into_iter().find(|r| r.success) {
                return Some(result);
            }
        }
        None
    }
}

/// The identified join strategy for two results (operator mapping or value overlap).
enum JoinPlan {
    Pairwise {
        left: usize,
        left_column: String,
        right: usize,
        right_column: String,
    },
    ByName {
        column: String,
        indices: Vec<usize>,
    },
}

fn common_name_join(results: &[DbResult]) -> Option<JoinPlan> {
    let mut best: Option<(String, Vec<usize>)> = None;
    let mut seen_names: Vec<String> = Vec::new();
    for result in results {
        for col in &result.columns {
            if col.to_lowercase().ends_with(MIN_ID_SUFFIX) && !seen_names.iter().any(|n| n.eq_ignore_ascii_case(col)) {
                seen_names.push(col.clone());
            }
        }
    }

    for name in seen_names {
        let indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.column_index(&name).is_some())
            .map(|(i, _)| i)
            .collect();
        if indices.len() >= 2 && best.as_ref().is_none_or(|(_, b)| indices.len() > b.len()) {
            best = Some((name, indices));
        }
    }

    best.map(|(column, indices)| JoinPlan::ByName { column, indices })
}

fn value_overlap_join(results: &[DbResult]) -> Option<JoinPlan> {
    let mut id_columns: Vec<(usize, usize, std::collections::HashSet<String>)> = Vec::new();
    for (ri, result) in results.iter().enumerate() {
        for (ci, col) in result.columns.iter().enumerate() {
            if !col.to_lowercase().ends_with(MIN_ID_SUFFIX) {
                continue;
            }
            let values: std::collections::HashSet<String> =
                result.rows.iter().filter_map(|row| row.get(ci)).map(|v| normalize(v)).collect();
            if !values.is_empty() {
                id_columns.push((ri, ci, values));
            }
        }
    }

    let mut best: Option<(usize, usize, usize, usize, usize)> = None;
    for i in 0..id_columns.len() {
        for j in (i + 1)..id_columns.len() {
            let (ri, ci, vi) = &id_columns[i];
            let (rj, cj, vj) = &id_columns[j];
            if ri == rj {
                continue;
            }
            let intersection = vi.intersection(vj).count();
            let threshold = (vi.len().min(vj.len()) / 10).max(2);
            if intersection >= threshold && best.is_none_or(|(_, _, _, _, best_n)| intersection > best_n) {
                best = Some((*ri, *ci, *rj, *cj, intersection));
            }
        }
    }

    best.map(|(ri, ci, rj, cj, _)| JoinPlan::Pairwise {
        left: ri,
        left_column: results[ri].columns[ci].clone(),
        right: rj,
        right_column: results[rj].columns[cj].clone(),
    })
}

fn perform_join(results: &[DbResult], plan: &JoinPlan) -> (Vec<String>, Vec<Vec<String>>) {
    match plan {
        JoinPlan::Pairwise {
            left,
            left_column,
            right,
            right_column,
        } => join_pair(&results[*left], left_column, &results[*right], right_column),
        JoinPlan::ByName { column, indices } => {
            let mut iter = indices.iter();
            let Some(&first) = iter.next() else {
                return (Vec::new(), Vec::new());
            };
            let mut columns = results[first].columns.clone();
            let mut rows = results[first].rows.clone();
            for &next in iter {
                let (joined_columns, joined_rows) = join_rows(&columns, &rows, column, &results[next], column);
                columns = joined_columns;
                rows = joined_rows;
            }
            (columns, rows)
        }
    }
}

fn join_pair(left: &DbResult, left_col: &str, right: &DbResult, right_col: &str) -> (Vec<String>, Vec<Vec<String>>) {
    join_rows(&left.columns, &left.rows, left_col, right, right_col)
}

fn join_rows(
    left_columns: &[String],
    left_rows: &[Vec<String>],
    left_col: &str,
    right: &DbResult,
    right_col: &str,
) -> (Vec<String>, Vec<Vec<String>>) {
    let Some(li) = left_columns.iter().position(|c| c.eq_ignore_ascii_case(left_col)) else {
        return (left_columns.to_vec(), left_rows.to_vec());
    };
    let Some(ri) = right.column_index(right_col) else {
        return (left_columns.to_vec(), left_rows.to_vec());
    };

    let mut columns = left_columns.to_vec();
    for (i, col) in right.columns.iter().enumerate() {
        if i != ri {
            columns.push(col.clone());
        }
    }

    let mut rows = Vec::new();
    for left_row in left_rows {
        let Some(left_value) = left_row.get(li) else { continue };
        for right_row in &right.rows {
            let Some(right_value) = right_row.get(ri) else { continue };
            if values_equal(left_value, right_value) {
                let mut merged = left_row.clone();
                for (i, value) in right_row.iter().enumerate() {
                    if i != ri {
                        merged.push(value.clone());
                    }
                }
                rows.push(merged);
            }
        }
    }

    (columns, rows)
}

fn values_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => (x - y).abs() < 1e-6,
        _ => false,
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn is_numeric(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

/// Step E: formats a merged table as `📊 Total rows: N | Columns: ...` plus
/// tab-separated header and rows.
fn format_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut out = format!("📊 Total rows: {} | Columns: {}\n", rows.len(), columns.join(", "));
    out.push_str(&columns.join("\t"));
    out.push('\n');
    for row in rows {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}

/// Step D: no joinable path was found — emit each result separately with
/// join hints (shared ID column names, overlapping values) guiding the
/// synthesizer to correlate rows manually.
fn format_separated_with_hints(results: &[DbResult]) -> String {
    let mut out = String::new();
    let total: usize = results.iter().map(DbResult::row_count).sum();
    out.push_str(&format!("📊 Total rows: {total} (across {} sources, no join path found)\n\n", results.len()));

    for result in results {
        out.push_str(&format!("-- {} --\n", result.database_id));
        out.push_str(&format_table(&result.columns, &result.rows));
        out.push('\n');
    }

    let shared_ids = shared_id_columns(results);
    if shared_ids.is_empty() {
        out.push_str("No shared ID-like column names were found across sources; correlate rows by inspecting values manually.\n");
    } else {
        out.push_str(&format!(
            "Hint: shared ID-like column names across sources: {}. Correlate rows across sources by matching these values manually.\n",
            shared_ids.join(", ")
        ));
    }
    out
}

fn shared_id_columns(results: &[DbResult]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for result in results {
        for col in &result.columns {
            if col.to_lowercase().ends_with(MIN_ID_SUFFIX) && !names.iter().any(|n| n.eq_ignore_ascii_case(col)) {
                let count = results.iter().filter(|r| r.column_index(col).is_some()).count();
                if count >= 2 {
                    names.push(col.clone());
                }
            }
        }
    }
    names
}

/// The formatted evidence block plus row count and whether a join succeeded.
pub struct MergeOutcome {
    /// The formatted tabular text block (`MergedEvidence.database_text`).
    pub database_text: String,
    /// Total rows represented in `database_text`.
    pub database_row_count: usize,
    /// `true` if no join path was found and join hints were emitted instead.
    pub used_join_hints: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_registry::DatabaseConnectionConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(Vec::<DatabaseConnectionConfig>::new(), Vec::new())
    }

    fn executor() -> DatabaseExecutor {
        DatabaseExecutor::new(HashMap::new(), Duration::from_secs(5))
    }

    fn result(db: &str, columns: &[&str], rows: Vec<Vec<&str>>) -> DbResult {
        DbResult::success(
            db,
            "SELECT 1",
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows.into_iter().map(|r| r.into_iter().map(str::to_string).collect()).collect(),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn single_result_formats_without_join() {
        let reg = registry();
        let exec = executor();
        let merger = ResultMerger::new(&reg, &exec);
        let results = vec![result("a", &["Id", "Name"], vec![vec!["1", "Ada"]])];
        let outcome = merger.merge(results, CancellationToken::new()).await;
        assert_eq!(outcome.database_row_count, 1);
        assert!(!outcome.used_join_hints);
        assert!(outcome.database_text.contains("📊 Total rows: 1"));
    }

    #[tokio::test]
    async fn joins_on_common_id_column_name() {
        let reg = registry();
        let exec = executor();
        let merger = ResultMerger::new(&reg, &exec);
        let results = vec![
            result("orders_db", &["OrderId", "CustomerId"], vec![vec!["1", "10"], vec!["2", "20"]]),
            result("crm_db", &["CustomerId", "Name"], vec![vec!["10", "Ada"], vec!["30", "Grace"]]),
        ];
        let outcome = merger.merge(results, CancellationToken::new()).await;
        assert!(!outcome.used_join_hints);
        assert_eq!(outcome.database_row_count, 1);
        assert!(outcome.database_text.contains("Ada"));
        assert!(!outcome.database_text.contains("Grace"));
    }

    #[tokio::test]
    async fn no_join_path_falls_back_to_hints() {
        let reg = registry();
        let exec = executor();
        let merger = ResultMerger::new(&reg, &exec);
        let results = vec![
            result("a", &["Title"], vec![vec!["Report"]]),
            result("b", &["Description"], vec![vec!["Summary"]]),
        ];
        let outcome = merger.merge(results, CancellationToken::new()).await;
        assert!(outcome.used_join_hints);
        assert_eq!(outcome.database_row_count, 2);
    }

    #[tokio::test]
    async fn empty_results_yield_empty_evidence() {
        let reg = registry();
        let exec = executor();
        let merger = ResultMerger::new(&reg, &exec);
        let outcome = merger.merge(Vec::new(), CancellationToken::new()).await;
        assert_eq!(outcome.database_row_count, 0);
        assert!(outcome.database_text.is_empty());
    }

    #[test]
    fn values_equal_handles_numeric_epsilon() {
        assert!(values_equal("10", "10.0000001"));
        assert!(values_equal(" Ada ", "ada"));
        assert!(!values_equal("10", "20"));
    }
}
