use serde_json::Value;

use crate::aql::arena::{NodeId, StrId};

/// Kind of a query, decided by its data-modification statement if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    Read,
    Remove,
    Insert,
    Update,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Main,
    Subquery,
    For,
    Expand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Plus,
    Minus,
    Times,
    Divide,
    Modulus,
}

/// One AST node. Children are referenced by id and live in the same arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// a statement removed by an optimizer
    Nop,
    ScopeStart(ScopeKind),
    ScopeEnd,
    For { variable: StrId, expression: NodeId },
    Let { variable: StrId, expression: NodeId },
    Filter { expression: NodeId },
    Sort { elements: Vec<NodeId> },
    SortElement { expression: NodeId, ascending: bool },
    Limit { offset: NodeId, count: NodeId },
    Return { expression: NodeId },
    Modify { kind: QueryType, collection: NodeId, expression: NodeId, options: Option<NodeId> },
    Collection(StrId),
    Reference(StrId),
    /// `@name`, or `@@name` for a collection parameter; the name keeps the second `@`
    Parameter(StrId),
    Value(Value),
    List(Vec<NodeId>),
    Array(Vec<(StrId, NodeId)>),
    Attribute { object: NodeId, name: StrId },
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Call { function: StrId, args: Vec<NodeId> },
}

impl Node {
    pub fn is_nop(&self) -> bool {
        matches!(self, Node::Nop)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Node::Value(_))
    }
}
