use infra::IndexManager;

use crate::node::LogicalPlan;

/// Estimated shape of a (sub)plan: expected row count and a unitless cost
/// figure used only to compare candidate plans against each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanEstimate {
    pub rows: f64,
    pub cost: f64,
}

impl PlanEstimate {
    fn scan(rows: f64) -> Self {
        Self { rows, cost: rows }
    }
}

const DEFAULT_TABLE_ROWS: f64 = 1000.0;
const HASH_JOIN_BUILD_THRESHOLD: f64 = 10_000.0;

/// Estimates a plan's row count and cost bottom-up. A `Scan` with a filter
/// consults `index_manager` for the best matching index on the filter's
/// fields to derive selectivity from cardinality; with no matching index
/// it falls back to a fixed selectivity guess. Joins cost a hash join when
/// the smaller side is below `HASH_JOIN_BUILD_THRESHOLD` rows, otherwise a
/// sort-merge join.
pub fn estimate(plan: &LogicalPlan, index_manager: &IndexManager) -> PlanEstimate {
    match plan {
        LogicalPlan::Scan { table, filter, .. } => {
            let base = DEFAULT_TABLE_ROWS;
            match filter {
                None => PlanEstimate::scan(base),
                Some(expr) => {
                    let fields = leaf_fields(expr);
                    let selectivity = match index_manager.find_best_index(table, &fields) {
                        Some(index) if index.cardinality > 0 => 1.0 / index.cardinality as f64,
                        _ => 0.3,
                    };
                    let rows = (base * selectivity).max(1.0);
                    PlanEstimate { rows, cost: base }
                }
            }
        }
        LogicalPlan::Filter { input, .. } => {
            let inner = estimate(input, index_manager);
            PlanEstimate {
                rows: inner.rows * 0.5,
                cost: inner.cost + inner.rows,
            }
        }
        LogicalPlan::Project { input, .. } => {
            let inner = estimate(input, index_manager);
            PlanEstimate {
                rows: inner.rows,
                cost: inner.cost + inner.rows,
            }
        }
        LogicalPlan::Join { left, right, .. } => {
            let l = estimate(left, index_manager);
            let r = estimate(right, index_manager);
            let build_rows = l.rows.min(r.rows);
            let join_cost = if build_rows <= HASH_JOIN_BUILD_THRESHOLD {
                l.cost + r.cost + build_rows + l.rows.max(r.rows)
            } else {
                let sorted = |n: f64| n * n.max(1.0).log2();
                l.cost + r.cost + sorted(l.rows) + sorted(r.rows)
            };
            PlanEstimate {
                rows: l.rows * r.rows / DEFAULT_TABLE_ROWS.max(1.0),
                cost: join_cost,
            }
        }
        LogicalPlan::Aggregate { input, group_by, .. } => {
            let inner = estimate(input, index_manager);
            let rows = if group_by.is_empty() {
                1.0
            } else {
                (inner.rows / 10.0).max(1.0)
            };
            PlanEstimate {
                rows,
                cost: inner.cost + inner.rows,
            }
        }
        LogicalPlan::Sort { input, .. } => {
            let inner = estimate(input, index_manager);
            PlanEstimate {
                rows: inner.rows,
                cost: inner.cost + inner.rows * inner.rows.max(1.0).log2(),
            }
        }
        LogicalPlan::TopN { input, limit, .. } => {
            let inner = estimate(input, index_manager);
            PlanEstimate {
                rows: inner.rows.min(*limit as f64),
                cost: inner.cost + inner.rows.max(1.0).log2() * (*limit as f64).max(1.0),
            }
        }
        LogicalPlan::Limit { input, limit, .. } => {
            let inner = estimate(input, index_manager);
            PlanEstimate {
                rows: inner.rows.min(*limit as f64),
                cost: inner.cost,
            }
        }
    }
}

fn leaf_fields(expr: &datasource::filter::FilterExpr) -> Vec<String> {
    use datasource::filter::FilterExpr;
    match expr {
        FilterExpr::Leaf { field, .. } => vec![field.clone()],
        FilterExpr::Node { children, .. } => children.iter().flat_map(leaf_fields).collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::{ColumnInfo, TableInfo, Value};
    use datasource::filter::{FilterExpr, FilterOp};
    use infra::IndexDef;

    fn table() -> TableInfo {
        TableInfo::new("users", vec![ColumnInfo::new("id", "bigint").primary_key()])
    }

    #[test]
    fn scan_without_filter_uses_base_row_count() {
        let plan = LogicalPlan::scan("users", &table());
        let manager = IndexManager::new();
        let estimate = estimate(&plan, &manager);
        assert_eq!(estimate.rows, DEFAULT_TABLE_ROWS);
    }

    #[test]
    fn scan_with_indexed_filter_uses_cardinality_selectivity() {
        let manager = IndexManager::new();
        manager.register_index(IndexDef {
            name: "by_id".to_string(),
            table: "users".to_string(),
            columns: vec!["id".to_string()],
            cardinality: 100,
        });
        let plan = LogicalPlan::Scan {
            table: "users".to_string(),
            schema: vec![],
            filter: Some(FilterExpr::leaf("id", FilterOp::Eq, Value::Int(1))),
        };
        let estimate = estimate(&plan, &manager);
        assert_eq!(estimate.rows, DEFAULT_TABLE_ROWS / 100.0);
    }

    #[test]
    fn limit_caps_row_estimate() {
        let plan = LogicalPlan::Limit {
            input: Box::new(LogicalPlan::scan("users", &table())),
            limit: 5,
            offset: 0,
        };
        let manager = IndexManager::new();
        let estimate = estimate(&plan, &manager);
        assert_eq!(estimate.rows, 5.0);
    }
}
