pub mod arena;
pub mod bind;
pub mod collections;
pub mod context;
pub mod node;
pub mod scope;

pub use arena::{NodeArena, NodeId, StrId, StringArena};
pub use context::{AqlContext, QueryOptimizer, QueryParser};
pub use node::{BinaryOp, Node, QueryType, ScopeKind, UnaryOp};
