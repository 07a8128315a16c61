use serde_json::Value;

use crate::core::error::{Error, ErrorKind, Result};
use crate::shape::shaped::ShapedJson;
use crate::shape::shaper::Shaper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Lookup condition handed to the skiplist and bitarray indexes.
///
/// A relation compares the first `values.len()` indexed attributes with the literals
/// in field order.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperator {
    Relation {
        op: RelationOp,
        values: Vec<Value>,
    },
    Logical {
        op: LogicalOp,
        left: Box<IndexOperator>,
        right: Option<Box<IndexOperator>>,
    },
}

impl IndexOperator {
    pub fn relation(op: RelationOp, values: Vec<Value>) -> Self {
        IndexOperator::Relation { op, values }
    }

    pub fn eq(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Eq, values)
    }

    pub fn ne(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Ne, values)
    }

    pub fn lt(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Lt, values)
    }

    pub fn le(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Le, values)
    }

    pub fn gt(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Gt, values)
    }

    pub fn ge(values: Vec<Value>) -> Self {
        Self::relation(RelationOp::Ge, values)
    }

    pub fn and(left: IndexOperator, right: IndexOperator) -> Self {
        IndexOperator::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Some(Box::new(right)),
        }
    }

    pub fn or(left: IndexOperator, right: IndexOperator) -> Self {
        IndexOperator::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Some(Box::new(right)),
        }
    }

    pub fn not(operand: IndexOperator) -> Self {
        IndexOperator::Logical {
            op: LogicalOp::Not,
            left: Box::new(operand),
            right: None,
        }
    }

    /// Converts the JSON literals into shaped values comparable with index entries.
    /// Consumes the tree.
    pub fn fill(self, shaper: &dyn Shaper, field_count: usize) -> Result<FilledOperator> {
        match self {
            IndexOperator::Relation { op, values } => {
                if values.is_empty() || values.len() > field_count {
                    return Err(Error::new(
                        ErrorKind::BadParameter,
                        format!(
                            "operator expects 1 to {} values, got {}",
                            field_count,
                            values.len()
                        ),
                    ));
                }
                if op != RelationOp::Eq && values.iter().any(|v| v.is_array() || v.is_object()) {
                    return Err(Error::new(
                        ErrorKind::BadParameter,
                        format!("{:?} is not allowed on list or array values", op),
                    ));
                }
                let values = values
                    .iter()
                    .map(|v| shaper.shape_json(v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(FilledOperator::Relation { op, values })
            }
            IndexOperator::Logical { op, left, right } => {
                let right = match (op, right) {
                    (LogicalOp::Not, None) => None,
                    (LogicalOp::And | LogicalOp::Or, Some(right)) => {
                        Some(Box::new(right.fill(shaper, field_count)?))
                    }
                    _ => {
                        return Err(Error::new(
                            ErrorKind::BadParameter,
                            format!("malformed {:?} operator", op),
                        ));
                    }
                };
                Ok(FilledOperator::Logical {
                    op,
                    left: Box::new(left.fill(shaper, field_count)?),
                    right,
                })
            }
        }
    }
}

/// Operator tree with shaped literals
#[derive(Debug, Clone)]
pub enum FilledOperator {
    Relation {
        op: RelationOp,
        values: Vec<ShapedJson>,
    },
    Logical {
        op: LogicalOp,
        left: Box<FilledOperator>,
        right: Option<Box<FilledOperator>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::shaper::VocShaper;
    use serde_json::json;

    #[test]
    fn structured_literals_only_allowed_for_equality() {
        let shaper = VocShaper::new();
        assert!(IndexOperator::eq(vec![json!([1, 2])]).fill(&shaper, 1).is_ok());

        let err = IndexOperator::lt(vec![json!([1, 2])]).fill(&shaper, 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
        let err = IndexOperator::ne(vec![json!({"a": 1})]).fill(&shaper, 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadParameter);
    }

    #[test]
    fn value_count_is_bounded_by_fields() {
        let shaper = VocShaper::new();
        assert!(IndexOperator::eq(vec![]).fill(&shaper, 2).is_err());
        assert!(IndexOperator::eq(vec![json!(1), json!(2), json!(3)]).fill(&shaper, 2).is_err());
        let op = IndexOperator::and(
            IndexOperator::ge(vec![json!(1)]),
            IndexOperator::not(IndexOperator::eq(vec![json!(1), json!("x")])),
        );
        assert!(op.fill(&shaper, 2).is_ok());
    }
}
