use common::row::Value;

/// Comparison operator at a filter leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    Is,
    IsNot,
}

/// Boolean combinator for an internal filter node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// A filter expression tree pushed down to a `FilterableDataSource`: either
/// a leaf comparing one field against a value, or an internal node
/// combining sub-filters with AND/OR.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Leaf {
        field: String,
        op: FilterOp,
        value: Value,
    },
    Node {
        logic: LogicOp,
        children: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn leaf(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        FilterExpr::Leaf {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn and(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Node {
            logic: LogicOp::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Node {
            logic: LogicOp::Or,
            children,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_nested_and_or_tree() {
        let expr = FilterExpr::and(vec![
            FilterExpr::leaf("age", FilterOp::Gte, Value::Int(18)),
            FilterExpr::or(vec![
                FilterExpr::leaf("status", FilterOp::Eq, Value::String("active".into())),
                FilterExpr::leaf("status", FilterOp::Eq, Value::String("pending".into())),
            ]),
        ]);
        match expr {
            FilterExpr::Node { logic, children } => {
                assert_eq!(logic, LogicOp::And);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected node"),
        }
    }
}
