use common::row::{TableInfo, Value};
use datasource::filter::FilterExpr;

/// One column projected or produced by a plan node.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub type_name: String,
}

impl From<&common::row::ColumnInfo> for FieldSchema {
    fn from(col: &common::row::ColumnInfo) -> Self {
        Self {
            name: col.name.clone(),
            type_name: col.type_name.clone(),
        }
    }
}

/// A single `ORDER BY` item.
#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub field: String,
    pub descending: bool,
}

/// A projected output column: a source field possibly renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    pub field: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum JoinKind {
    Inner,
    Left,
}

/// Logical plan node. Each variant carries its own children and output
/// schema; rewrites consume a node and return a replacement rather than
/// mutating in place, so the tree never needs back-pointers.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Scan {
        table: String,
        schema: Vec<FieldSchema>,
        filter: Option<FilterExpr>,
    },
    Filter {
        input: Box<LogicalPlan>,
        predicate: FilterExpr,
    },
    Project {
        input: Box<LogicalPlan>,
        items: Vec<ProjectItem>,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        kind: JoinKind,
        left_key: String,
        right_key: String,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<String>,
        aggregates: Vec<(String, String)>,
    },
    Sort {
        input: Box<LogicalPlan>,
        items: Vec<SortItem>,
    },
    TopN {
        input: Box<LogicalPlan>,
        items: Vec<SortItem>,
        limit: usize,
        offset: usize,
    },
    Limit {
        input: Box<LogicalPlan>,
        limit: usize,
        offset: usize,
    },
}

impl LogicalPlan {
    pub fn scan(table: impl Into<String>, info: &TableInfo) -> Self {
        LogicalPlan::Scan {
            table: table.into(),
            schema: info.columns.iter().map(FieldSchema::from).collect(),
            filter: None,
        }
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::TopN { input, .. }
            | LogicalPlan::Limit { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
        }
    }

    /// Replaces this node's children in place, preserving every other
    /// field. Panics if `new_children` has the wrong arity for this
    /// variant — a programming error in a rewrite, not a data error.
    pub fn set_children(&mut self, new_children: Vec<LogicalPlan>) {
        match self {
            LogicalPlan::Scan { .. } => {
                assert!(new_children.is_empty(), "Scan has no children");
            }
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::TopN { input, .. }
            | LogicalPlan::Limit { input, .. } => {
                let mut iter = new_children.into_iter();
                *input = Box::new(iter.next().expect("single-child node needs one child"));
                assert!(iter.next().is_none(), "single-child node got extra children");
            }
            LogicalPlan::Join { left, right, .. } => {
                let mut iter = new_children.into_iter();
                *left = Box::new(iter.next().expect("join needs a left child"));
                *right = Box::new(iter.next().expect("join needs a right child"));
                assert!(iter.next().is_none(), "join got extra children");
            }
        }
    }

    pub fn schema(&self) -> Vec<FieldSchema> {
        match self {
            LogicalPlan::Scan { schema, .. } => schema.clone(),
            LogicalPlan::Filter { input, .. } => input.schema(),
            LogicalPlan::Project { input, items } => items
                .iter()
                .map(|item| {
                    let source = input
                        .schema()
                        .into_iter()
                        .find(|f| f.name == item.field)
                        .unwrap_or(FieldSchema {
                            name: item.field.clone(),
                            type_name: "unknown".to_string(),
                        });
                    FieldSchema {
                        name: item.alias.clone().unwrap_or(source.name),
                        type_name: source.type_name,
                    }
                })
                .collect(),
            LogicalPlan::Join { left, right, .. } => {
                let mut schema = left.schema();
                schema.extend(right.schema());
                schema
            }
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                let mut schema: Vec<FieldSchema> = group_by
                    .iter()
                    .map(|name| FieldSchema {
                        name: name.clone(),
                        type_name: "unknown".to_string(),
                    })
                    .collect();
                schema.extend(aggregates.iter().map(|(func, field)| FieldSchema {
                    name: format!("{}({})", func, field),
                    type_name: "unknown".to_string(),
                }));
                schema
            }
            LogicalPlan::Sort { input, .. }
            | LogicalPlan::TopN { input, .. }
            | LogicalPlan::Limit { input, .. } => input.schema(),
        }
    }

    /// `EXPLAIN`-style single-line-per-node rendering, indented by depth.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            LogicalPlan::Scan { table, filter, .. } => {
                out.push_str(&format!(
                    "{indent}Scan({table}){}\n",
                    if filter.is_some() { " +filter" } else { "" }
                ));
            }
            LogicalPlan::Filter { input, .. } => {
                out.push_str(&format!("{indent}Filter\n"));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Project { input, items } => {
                out.push_str(&format!("{indent}Project({} cols)\n", items.len()));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Join {
                left, right, kind, ..
            } => {
                out.push_str(&format!("{indent}Join({:?})\n", kind));
                left.explain_into(out, depth + 1);
                right.explain_into(out, depth + 1);
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                out.push_str(&format!(
                    "{indent}Aggregate(group_by={}, aggs={})\n",
                    group_by.len(),
                    aggregates.len()
                ));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Sort { input, items } => {
                out.push_str(&format!("{indent}Sort({} keys)\n", items.len()));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::TopN {
                input,
                limit,
                offset,
                ..
            } => {
                out.push_str(&format!("{indent}TopN(limit={limit}, offset={offset})\n"));
                input.explain_into(out, depth + 1);
            }
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => {
                out.push_str(&format!("{indent}Limit(limit={limit}, offset={offset})\n"));
                input.explain_into(out, depth + 1);
            }
        }
    }
}
