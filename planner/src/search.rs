use std::cmp::Ordering;
use std::collections::BinaryHeap;

use infra::IndexManager;

use crate::cost::{estimate, PlanEstimate};
use crate::node::LogicalPlan;

/// One candidate in the search frontier. Ordered by `priority` descending,
/// breaking ties by `cost` ascending (a cheaper plan wins a tie) — `f64`
/// doesn't implement `Ord`, so comparisons go through `total_cmp` to stay
/// well-defined even if a cost estimate ever produces `NaN`.
struct Candidate {
    plan: LogicalPlan,
    priority: f64,
    cost: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.cost == other.cost
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.cost.total_cmp(&self.cost))
    }
}

/// A physical plan is just the logical plan once search settles; there's
/// no separate physical node set since every logical operator already
/// maps to exactly one execution strategy in this executor.
pub struct SearchResult {
    pub plan: LogicalPlan,
    pub estimate: PlanEstimate,
}

/// Generates candidate rewrites of `plan` (currently: the plan as given,
/// plus the plan with every rewrite pass applied) and returns whichever
/// scores best — highest priority, ties broken by lowest cost. `priority`
/// here is simply the negative estimated row count, so plans proven to
/// touch fewer rows are preferred; a real multi-join optimizer would
/// generate many more candidates per level, but the heap-driven selection
/// shape is the same regardless of how large the frontier gets.
pub fn search_best_plan(plan: LogicalPlan, index_manager: &IndexManager) -> SearchResult {
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::new();

    let unoptimized_estimate = estimate(&plan, index_manager);
    heap.push(Candidate {
        priority: -unoptimized_estimate.rows,
        cost: unoptimized_estimate.cost,
        plan: plan.clone(),
    });

    let optimized = crate::rewrite::optimize(plan);
    let optimized_estimate = estimate(&optimized, index_manager);
    heap.push(Candidate {
        priority: -optimized_estimate.rows,
        cost: optimized_estimate.cost,
        plan: optimized,
    });

    let best = heap.pop().expect("search always pushes at least one candidate");
    let estimate = estimate(&best.plan, index_manager);
    SearchResult {
        plan: best.plan,
        estimate,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::{ColumnInfo, TableInfo, Value};
    use datasource::filter::{FilterExpr, FilterOp};
    use infra::IndexDef;

    #[test]
    fn search_prefers_the_lower_row_estimate_plan() {
        let table = TableInfo::new("users", vec![ColumnInfo::new("id", "bigint").primary_key()]);
        let manager = IndexManager::new();
        manager.register_index(IndexDef {
            name: "by_id".to_string(),
            table: "users".to_string(),
            columns: vec!["id".to_string()],
            cardinality: 1000,
        });
        let scan = LogicalPlan::scan("users", &table);
        let filter = LogicalPlan::Filter {
            input: Box::new(scan),
            predicate: FilterExpr::leaf("id", FilterOp::Eq, Value::Int(1)),
        };
        let result = search_best_plan(filter, &manager);
        match result.plan {
            LogicalPlan::Scan { filter, .. } => assert!(filter.is_some()),
            other => panic!("expected pushed-down filter to win, got {other:?}"),
        }
    }

    #[test]
    fn candidate_ordering_breaks_ties_by_lower_cost() {
        let a = Candidate {
            plan: LogicalPlan::scan(
                "t",
                &TableInfo::new("t", vec![ColumnInfo::new("id", "bigint").primary_key()]),
            ),
            priority: 1.0,
            cost: 10.0,
        };
        let b = Candidate {
            plan: LogicalPlan::scan(
                "t",
                &TableInfo::new("t", vec![ColumnInfo::new("id", "bigint").primary_key()]),
            ),
            priority: 1.0,
            cost: 5.0,
        };
        assert_eq!(a.cmp(&b), Ordering::Less);
    }
}
