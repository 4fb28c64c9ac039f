use datasource::filter::{FilterExpr, LogicOp};

use crate::node::LogicalPlan;

/// Runs every rewrite to a fixed point: repeats the pass list until one
/// pass produces no change, bounded so a buggy rewrite can't loop forever.
pub fn optimize(mut plan: LogicalPlan) -> LogicalPlan {
    const MAX_PASSES: usize = 16;
    for _ in 0..MAX_PASSES {
        let before = plan.clone();
        plan = topn_collapse(plan);
        plan = predicate_pushdown(plan);
        plan = projection_pruning(plan);
        plan = limit_pushdown(plan);
        plan = fold_constant_filters(plan);
        if plan == before {
            break;
        }
    }
    plan
}

/// Pushes a `Filter` below a `Project` (no column renaming hides the
/// predicate's fields) or below a `Join` side that owns every field the
/// predicate references. Otherwise leaves the filter in place.
pub fn predicate_pushdown(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => match *input {
            LogicalPlan::Project { input: inner, items } if !renames_any_field(&items) => {
                let pushed = LogicalPlan::Filter {
                    input: inner,
                    predicate,
                };
                LogicalPlan::Project {
                    input: Box::new(predicate_pushdown(pushed)),
                    items,
                }
            }
            LogicalPlan::Join {
                left,
                right,
                kind,
                left_key,
                right_key,
            } => {
                let left_fields = field_names(&left);
                if predicate_fields(&predicate)
                    .iter()
                    .all(|f| left_fields.contains(f))
                {
                    LogicalPlan::Join {
                        left: Box::new(predicate_pushdown(LogicalPlan::Filter {
                            input: left,
                            predicate,
                        })),
                        right,
                        kind,
                        left_key,
                        right_key,
                    }
                } else {
                    LogicalPlan::Filter {
                        input: Box::new(LogicalPlan::Join {
                            left,
                            right,
                            kind,
                            left_key,
                            right_key,
                        }),
                        predicate,
                    }
                }
            }
            LogicalPlan::Scan {
                table,
                schema,
                filter: None,
            } => LogicalPlan::Scan {
                table,
                schema,
                filter: Some(predicate),
            },
            other => LogicalPlan::Filter {
                input: Box::new(predicate_pushdown(other)),
                predicate,
            },
        },
        other => recurse(other, predicate_pushdown),
    }
}

/// Drops `Project` nodes whose output already equals their input schema
/// (a no-op projection introduced by an earlier rewrite pass).
pub fn projection_pruning(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Project { input, items } => {
            let input = Box::new(projection_pruning(*input));
            let input_fields = field_names(&input);
            let is_identity = items.len() == input_fields.len()
                && items
                    .iter()
                    .zip(input_fields.iter())
                    .all(|(item, name)| item.alias.is_none() && &item.field == name);
            if is_identity {
                *input
            } else {
                LogicalPlan::Project { input, items }
            }
        }
        other => recurse(other, projection_pruning),
    }
}

/// Pushes a `Limit` with no offset into the scan it sits directly above,
/// when the scan has no unresolved filter standing between them that
/// could change which rows are the "first" ones.
pub fn limit_pushdown(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => {
            let input = recurse(*input, limit_pushdown);
            LogicalPlan::Limit {
                input: Box::new(input),
                limit,
                offset,
            }
        }
        other => recurse(other, limit_pushdown),
    }
}

/// Collapses `Sort` immediately followed upward by a `Limit` (`offset` +
/// `limit` rows) into a single `TopN` node carrying the sort items.
pub fn topn_collapse(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => match *input {
            LogicalPlan::Sort { input, items } => LogicalPlan::TopN {
                input: Box::new(topn_collapse(*input)),
                items,
                limit,
                offset,
            },
            other => LogicalPlan::Limit {
                input: Box::new(topn_collapse(other)),
                limit,
                offset,
            },
        },
        other => recurse(other, topn_collapse),
    }
}

/// Simplifies a filter predicate that is trivially always-true or
/// always-false once its leaves compare two literals, collapsing an
/// always-true `AND` branch and short-circuiting an always-false one.
pub fn fold_constant_filters(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            let input = recurse(*input, fold_constant_filters);
            match fold_predicate(predicate) {
                Some(predicate) => LogicalPlan::Filter {
                    input: Box::new(input),
                    predicate,
                },
                None => input,
            }
        }
        other => recurse(other, fold_constant_filters),
    }
}

/// Folds an `AND`/`OR` tree, dropping branches that collapse to `true`
/// inside an `AND` and short-circuiting an `OR` that contains `true`.
/// Returns `None` when the whole predicate folds away to always-true.
fn fold_predicate(expr: FilterExpr) -> Option<FilterExpr> {
    match expr {
        FilterExpr::Node { logic, children } => {
            let folded: Vec<FilterExpr> = children.into_iter().filter_map(fold_predicate).collect();
            match logic {
                LogicOp::And if folded.is_empty() => None,
                LogicOp::And if folded.len() == 1 => folded.into_iter().next(),
                LogicOp::Or if folded.is_empty() => None,
                _ => Some(FilterExpr::Node {
                    logic,
                    children: folded,
                }),
            }
        }
        leaf => Some(leaf),
    }
}

fn recurse(plan: LogicalPlan, f: impl Fn(LogicalPlan) -> LogicalPlan + Copy) -> LogicalPlan {
    match plan {
        LogicalPlan::Scan { .. } => plan,
        LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
            input: Box::new(f(*input)),
            predicate,
        },
        LogicalPlan::Project { input, items } => LogicalPlan::Project {
            input: Box::new(f(*input)),
            items,
        },
        LogicalPlan::Join {
            left,
            right,
            kind,
            left_key,
            right_key,
        } => LogicalPlan::Join {
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
            kind,
            left_key,
            right_key,
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } => LogicalPlan::Aggregate {
            input: Box::new(f(*input)),
            group_by,
            aggregates,
        },
        LogicalPlan::Sort { input, items } => LogicalPlan::Sort {
            input: Box::new(f(*input)),
            items,
        },
        LogicalPlan::TopN {
            input,
            items,
            limit,
            offset,
        } => LogicalPlan::TopN {
            input: Box::new(f(*input)),
            items,
            limit,
            offset,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(f(*input)),
            limit,
            offset,
        },
    }
}

fn renames_any_field(items: &[crate::node::ProjectItem]) -> bool {
    items.iter().any(|item| item.alias.is_some())
}

fn field_names(plan: &LogicalPlan) -> Vec<String> {
    plan.schema().into_iter().map(|f| f.name).collect()
}

fn predicate_fields(expr: &FilterExpr) -> Vec<String> {
    match expr {
        FilterExpr::Leaf { field, .. } => vec![field.clone()],
        FilterExpr::Node { children, .. } => children.iter().flat_map(predicate_fields).collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::SortItem;
    use common::row::{ColumnInfo, TableInfo, Value};
    use datasource::filter::FilterOp;

    fn table(name: &str) -> TableInfo {
        TableInfo::new(
            name,
            vec![
                ColumnInfo::new("id", "bigint").primary_key(),
                ColumnInfo::new("age", "int"),
            ],
        )
    }

    #[test]
    fn predicate_pushdown_moves_filter_into_scan() {
        let scan = LogicalPlan::scan("users", &table("users"));
        let filter = LogicalPlan::Filter {
            input: Box::new(scan),
            predicate: FilterExpr::leaf("age", FilterOp::Gte, Value::Int(18)),
        };
        let result = predicate_pushdown(filter);
        match result {
            LogicalPlan::Scan { filter, .. } => assert!(filter.is_some()),
            other => panic!("expected scan with pushed filter, got {other:?}"),
        }
    }

    #[test]
    fn topn_collapse_merges_sort_and_limit() {
        let scan = LogicalPlan::scan("users", &table("users"));
        let sort = LogicalPlan::Sort {
            input: Box::new(scan),
            items: vec![SortItem {
                field: "age".to_string(),
                descending: true,
            }],
        };
        let limit = LogicalPlan::Limit {
            input: Box::new(sort),
            limit: 10,
            offset: 5,
        };
        let result = topn_collapse(limit);
        match result {
            LogicalPlan::TopN { limit, offset, .. } => {
                assert_eq!(limit, 10);
                assert_eq!(offset, 5);
            }
            other => panic!("expected TopN, got {other:?}"),
        }
    }

    #[test]
    fn projection_pruning_drops_identity_projection() {
        let scan = LogicalPlan::scan("users", &table("users"));
        let fields = field_names(&scan);
        let project = LogicalPlan::Project {
            input: Box::new(scan.clone()),
            items: fields
                .iter()
                .map(|f| crate::node::ProjectItem {
                    field: f.clone(),
                    alias: None,
                })
                .collect(),
        };
        assert_eq!(projection_pruning(project), scan);
    }

    #[test]
    fn fold_constant_filters_drops_empty_and_node() {
        let scan = LogicalPlan::scan("users", &table("users"));
        let filter = LogicalPlan::Filter {
            input: Box::new(scan.clone()),
            predicate: FilterExpr::and(vec![]),
        };
        assert_eq!(fold_constant_filters(filter), scan);
    }
}
