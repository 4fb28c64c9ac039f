use std::sync::RwLock;

use common::row::{Row, Value};

/// One observed `(table, columns)` combination the advisor was asked to
/// consider, e.g. a filter predicate's fields from a query that ran with
/// no matching index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WorkloadEntry {
    table: String,
    columns: Vec<String>,
}

/// One recommendation: add an index on `columns` for `table`, with a
/// rough estimated benefit derived from how often the combination was
/// observed with no existing index to serve it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecommendation {
    pub table: String,
    pub columns: Vec<String>,
    pub estimated_benefit: f64,
}

/// Backs `information_schema.INDEX_ADVISOR_RESULTS`: records workload
/// entries for table/column combinations that ran without a matching
/// index, and turns repeat offenders into recommendations.
#[derive(Default)]
pub struct IndexAdvisor {
    observations: RwLock<Vec<WorkloadEntry>>,
}

impl IndexAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one query execution that filtered `table` on `columns`
    /// without a matching index (the caller — the planner's cost stage —
    /// is the one that knows whether an index covered the filter).
    pub fn record_missing_index(&self, table: impl Into<String>, columns: Vec<String>) {
        self.observations.write().unwrap().push(WorkloadEntry {
            table: table.into(),
            columns,
        });
    }

    /// Recommendations ranked by observation count, highest first.
    /// Estimated benefit is simply the observation count: every repeat of
    /// an unindexed filter is a full scan that an index would have
    /// avoided.
    pub fn recommendations(&self) -> Vec<IndexRecommendation> {
        let observations = self.observations.read().unwrap();
        let mut counts: std::collections::HashMap<WorkloadEntry, u64> = std::collections::HashMap::new();
        for entry in observations.iter() {
            *counts.entry(entry.clone()).or_insert(0) += 1;
        }
        let mut recommendations: Vec<IndexRecommendation> = counts
            .into_iter()
            .map(|(entry, count)| IndexRecommendation {
                table: entry.table,
                columns: entry.columns,
                estimated_benefit: count as f64,
            })
            .collect();
        recommendations.sort_by(|a, b| b.estimated_benefit.total_cmp(&a.estimated_benefit));
        recommendations
    }

    pub fn clear(&self) {
        self.observations.write().unwrap().clear();
    }
}

pub fn rows(advisor: &IndexAdvisor) -> Vec<Row> {
    advisor
        .recommendations()
        .into_iter()
        .map(|rec| {
            let mut row = Row::new();
            row.set("TABLE_NAME", Value::String(rec.table));
            row.set(
                "INDEX_COLUMNS",
                Value::List(rec.columns.into_iter().map(Value::String).collect()),
            );
            row.set("ESTIMATED_BENEFIT", Value::Float(rec.estimated_benefit));
            row
        })
        .collect()
}
