use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::aql::arena::{NodeArena, NodeId, StrId, StringArena};
use crate::aql::bind::{BindParameters, is_collection_parameter};
use crate::aql::collections::CollectionRegistry;
use crate::aql::node::{Node, QueryType, ScopeKind};
use crate::aql::scope::ScopeStack;
use crate::collection::vocbase::{CollectionHandle, Vocbase};
use crate::core::error::{Error, ErrorKind, Result};
use crate::transaction::{AccessType, Transaction, TransactionContext};

/// Turns the query text into statements, nodes and collection and parameter
/// registrations on the context.
pub trait QueryParser {
    fn parse(&self, context: &mut AqlContext) -> Result<()>;
}

/// Rewrites the statements of a bound query. Removed statements become `Node::Nop`.
pub trait QueryOptimizer {
    fn optimise(&self, context: &mut AqlContext) -> Result<()>;
}

impl<F> QueryParser for F
where
    F: Fn(&mut AqlContext) -> Result<()>,
{
    fn parse(&self, context: &mut AqlContext) -> Result<()> {
        self(context)
    }
}

impl<F> QueryOptimizer for F
where
    F: Fn(&mut AqlContext) -> Result<()>,
{
    fn optimise(&self, context: &mut AqlContext) -> Result<()> {
        self(context)
    }
}

/// Everything one query owns between parsing and execution.
///
/// Nodes and strings live in arenas charged to the unknown memory zone and are
/// released together when the context is dropped. The first error raised by any
/// stage is kept and reported by every later stage.
pub struct AqlContext {
    vocbase: Arc<Vocbase>,
    query: String,
    nodes: NodeArena<Node>,
    strings: StringArena,
    statements: Vec<NodeId>,
    scopes: ScopeStack,
    parameters: BindParameters,
    collections: CollectionRegistry,
    error: Option<Error>,
    query_type: QueryType,
    write_collection: Option<NodeId>,
    write_options: Option<NodeId>,
    user_options: Option<Value>,
    full_count: bool,
    is_coordinator: bool,
}

impl AqlContext {
    pub fn new(vocbase: Arc<Vocbase>, query: &str, is_coordinator: bool, user_options: Option<Value>) -> Self {
        trace!(target: "aql.context", "creating context");
        let zone = Arc::clone(&vocbase.zones().unknown);
        let full_count = user_options
            .as_ref()
            .and_then(|options| options.get("fullCount"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        AqlContext {
            vocbase,
            query: query.to_string(),
            nodes: NodeArena::new(Arc::clone(&zone)),
            strings: StringArena::new(zone),
            statements: Vec::new(),
            scopes: ScopeStack::new(),
            parameters: BindParameters::default(),
            collections: CollectionRegistry::default(),
            error: None,
            query_type: QueryType::Read,
            write_collection: None,
            write_options: None,
            user_options,
            full_count,
            is_coordinator,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn vocbase(&self) -> &Arc<Vocbase> {
        &self.vocbase
    }

    pub fn is_coordinator(&self) -> bool {
        self.is_coordinator
    }

    pub fn full_count(&self) -> bool {
        self.full_count
    }

    /// A user option by name, if options were given as an object.
    pub fn get_option(&self, name: &str) -> Option<&Value> {
        self.user_options.as_ref()?.as_object()?.get(name)
    }

    // ----- errors -----

    /// Records an error unless one is recorded already.
    pub fn set_error(&mut self, err: Error) {
        if self.error.is_some() {
            return;
        }
        debug!(target: "aql.error", kind = ?err.kind, data = %err.context, "query error");
        self.error = Some(err);
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.set_error(err.clone());
        }
        result
    }

    /// The recorded error, after recording `result`'s.
    fn checked(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err) = result {
            self.set_error(err);
        }
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ----- arenas -----

    pub fn create_node(&mut self, node: Node) -> Result<NodeId> {
        let result = self.nodes.alloc(node);
        self.note(result)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn register_string(&mut self, value: &str, unescape: bool) -> Result<StrId> {
        let result = self.strings.register(value, unescape);
        self.note(result)
    }

    pub fn register_string2(&mut self, a: &str, b: &str) -> Result<StrId> {
        let result = self.strings.register2(a, b);
        self.note(result)
    }

    pub fn register_string3(&mut self, a: &str, b: &str, c: &str) -> Result<StrId> {
        let result = self.strings.register3(a, b, c);
        self.note(result)
    }

    pub fn string(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    /// Bytes the arenas charged to the memory zone.
    pub fn memory(&self) -> usize {
        self.nodes.memory() + self.strings.memory()
    }

    // ----- statements and scopes -----

    pub fn add_statement(&mut self, node: NodeId) {
        self.statements.push(node);
    }

    pub fn statements(&self) -> &[NodeId] {
        &self.statements
    }

    pub fn start_scope(&mut self, kind: ScopeKind) -> Result<()> {
        let node = self.create_node(Node::ScopeStart(kind))?;
        self.scopes.start(kind);
        self.add_statement(node);
        Ok(())
    }

    pub fn end_scope(&mut self) -> Result<()> {
        let result = self.scopes.end();
        self.note(result)?;
        let node = self.create_node(Node::ScopeEnd)?;
        self.add_statement(node);
        Ok(())
    }

    pub fn add_variable(&mut self, name: &str, definition: NodeId) -> Result<()> {
        let result = self.scopes.add_variable(name, definition);
        self.note(result)
    }

    pub fn lookup_variable(&self, name: &str) -> Option<NodeId> {
        self.scopes.lookup(name)
    }

    /// Registers a generated variable name such as `_3`.
    pub fn next_variable_name(&mut self) -> Result<StrId> {
        let name = self.scopes.next_variable_name();
        self.register_string(&name, false)
    }

    // ----- collections and parameters -----

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    /// A collection node for `name`, registering the collection.
    pub fn collection_node(&mut self, name: &str) -> Result<NodeId> {
        let result = self.collections.add(name);
        self.note(result)?;
        let name = self.register_string(name, false)?;
        self.create_node(Node::Collection(name))
    }

    /// A parameter node for `name` as written after the first `@`.
    pub fn parameter_node(&mut self, name: &str) -> Result<NodeId> {
        self.parameters.register_name(name);
        let name = self.register_string(name, false)?;
        self.create_node(Node::Parameter(name))
    }

    /// Marks the query as modifying `collection`, a collection or parameter
    /// node. A query modifies at most one collection.
    pub fn set_write_operation(&mut self, kind: QueryType, collection: NodeId, options: Option<NodeId>) -> Result<()> {
        if self.query_type != QueryType::Read {
            let err = Error::new(ErrorKind::QueryMultiModify, "only one data-modification operation per query");
            self.set_error(err.clone());
            return Err(err);
        }
        self.query_type = kind;
        self.write_collection = Some(collection);
        self.write_options = options;
        Ok(())
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Name of the modified collection once bind parameters are injected.
    pub fn write_collection(&self) -> Option<&str> {
        match self.nodes.get(self.write_collection?)? {
            Node::Collection(name) => Some(self.strings.get(*name)),
            _ => None,
        }
    }

    pub fn write_options(&self) -> Option<&Node> {
        self.nodes.get(self.write_options?)
    }

    // ----- pipeline -----

    /// Parses the query text.
    pub fn validate(&mut self, parser: &dyn QueryParser) -> Result<()> {
        if self.query.trim().is_empty() {
            return self.checked(Err(Error::new(ErrorKind::QueryEmpty, "query is empty")));
        }
        let result = parser.parse(self);
        self.checked(result)
    }

    /// Checks the caller's bind parameters against the query and replaces every
    /// parameter node with its value. Collection parameters become collection
    /// nodes and register their collection.
    pub fn bind(&mut self, parameters: Option<&Value>) -> Result<()> {
        let result = self
            .parameters
            .add_values(parameters)
            .and_then(|()| self.parameters.validate());
        self.checked(result)?;
        let result = self.inject();
        self.checked(result)
    }

    fn inject(&mut self) -> Result<()> {
        for id in self.nodes.ids() {
            let Some(Node::Parameter(name)) = self.nodes.get(id) else {
                continue;
            };
            let name = self.strings.get(*name).to_string();
            let value = self.parameters.value(&name).cloned().ok_or_else(|| {
                Error::new(
                    ErrorKind::QueryBindParameterMissing,
                    format!("no value specified for declared bind parameter '{}'", name),
                )
            })?;
            let replacement = if is_collection_parameter(&name) {
                let collection = value.as_str().unwrap_or_default();
                self.collections.add(collection)?;
                Node::Collection(self.strings.register(collection, false)?)
            } else {
                Node::Value(value)
            };
            if let Some(node) = self.nodes.get_mut(id) {
                *node = replacement;
            }
        }
        Ok(())
    }

    /// Runs the optimizer and drops the statements it removed.
    pub fn optimise(&mut self, optimizer: &dyn QueryOptimizer) -> Result<()> {
        let result = optimizer.optimise(self);
        self.checked(result)?;
        let nodes = &self.nodes;
        self.statements.retain(|id| nodes.get(*id).is_some_and(|node| !node.is_nop()));
        Ok(())
    }

    /// Resolves every used collection against the database.
    pub fn setup_collections(&mut self) -> Result<&[CollectionHandle]> {
        let result = self.collections.setup(&self.vocbase).map(|_| ());
        self.checked(result)?;
        Ok(self.collections.handles())
    }

    /// Starts a transaction reading every used collection and writing the
    /// modified one.
    pub fn begin_transaction(&self, context: Rc<TransactionContext>) -> Result<Transaction> {
        let mut trx = Transaction::new(Arc::clone(&self.vocbase), context)?;
        let write = self.write_collection();
        for name in self.collections.names() {
            let access = if Some(name) == write { AccessType::Write } else { AccessType::Read };
            trx.add_collection(name, access)?;
        }
        trx.begin()?;
        Ok(trx)
    }
}

impl Drop for AqlContext {
    fn drop(&mut self) {
        trace!(target: "aql.context", nodes = self.nodes.len(), strings = self.strings.len(), "freeing context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aql::node::BinaryOp;
    use crate::core::config::Config;
    use crate::core::types::CollectionType;
    use crate::transaction::TransactionStatus;
    use serde_json::json;

    fn vocbase(dir: &tempfile::TempDir) -> Arc<Vocbase> {
        let vocbase = Arc::new(Vocbase::open(Config::with_storage_path(dir.path())).unwrap());
        vocbase.create_collection("users", CollectionType::Document).unwrap();
        vocbase.create_collection("log", CollectionType::Document).unwrap();
        vocbase
    }

    /// FOR u IN @@coll FILTER u.age >= @min INSERT u INTO log
    fn parse_users(ctx: &mut AqlContext) -> Result<()> {
        let source = ctx.parameter_node("@coll")?;
        let u = ctx.register_string("u", false)?;
        let for_node = ctx.create_node(Node::For { variable: u, expression: source })?;
        ctx.add_statement(for_node);
        ctx.start_scope(ScopeKind::For)?;
        ctx.add_variable("u", for_node)?;

        let reference = ctx.create_node(Node::Reference(u))?;
        let age = ctx.register_string("age", false)?;
        let attribute = ctx.create_node(Node::Attribute { object: reference, name: age })?;
        let min = ctx.parameter_node("min")?;
        let compare = ctx.create_node(Node::Binary { op: BinaryOp::Ge, lhs: attribute, rhs: min })?;
        let filter = ctx.create_node(Node::Filter { expression: compare })?;
        ctx.add_statement(filter);

        let log = ctx.collection_node("log")?;
        let insert = ctx.create_node(Node::Modify {
            kind: QueryType::Insert,
            collection: log,
            expression: reference,
            options: None,
        })?;
        ctx.set_write_operation(QueryType::Insert, log, None)?;
        ctx.add_statement(insert);
        ctx.end_scope()
    }

    #[test]
    fn pipeline_binds_optimises_and_locks() {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = vocbase(&dir);
        let mut ctx = AqlContext::new(Arc::clone(&vocbase), "FOR u IN @@coll ...", false, None);

        ctx.validate(&parse_users).unwrap();
        assert_eq!(ctx.collections().names().collect::<Vec<_>>(), ["log"]);
        ctx.bind(Some(&json!({"@coll": "users", "min": 18}))).unwrap();
        assert_eq!(ctx.collections().names().collect::<Vec<_>>(), ["log", "users"]);
        assert_eq!(ctx.query_type(), QueryType::Insert);
        assert_eq!(ctx.write_collection(), Some("log"));

        let values: Vec<&Node> = (0..ctx.nodes.len())
            .filter_map(|i| ctx.node(NodeId(i)))
            .filter(|node| node.is_constant())
            .collect();
        assert_eq!(values, [&Node::Value(json!(18))]);

        // drop the filter
        let drop_filters = |ctx: &mut AqlContext| -> Result<()> {
            let filters: Vec<NodeId> = ctx
                .statements()
                .iter()
                .copied()
                .filter(|id| matches!(ctx.node(*id), Some(Node::Filter { .. })))
                .collect();
            for id in filters {
                if let Some(node) = ctx.node_mut(id) {
                    *node = Node::Nop;
                }
            }
            Ok(())
        };
        let before = ctx.statements().len();
        ctx.optimise(&drop_filters).unwrap();
        assert_eq!(ctx.statements().len(), before - 1);

        assert_eq!(ctx.setup_collections().unwrap().len(), 2);
        let trx = ctx.begin_transaction(TransactionContext::standalone()).unwrap();
        assert_eq!(trx.status(), TransactionStatus::Running);
        let log = vocbase.lookup_collection_by_name("log").unwrap();
        assert!(log.collection.try_read().is_none());
    }

    #[test]
    fn first_error_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AqlContext::new(vocbase(&dir), "  ", false, None);
        assert_eq!(ctx.validate(&parse_users).unwrap_err().kind, ErrorKind::QueryEmpty);
        ctx.set_error(Error::new(ErrorKind::QueryParse, "later"));
        assert_eq!(ctx.error().unwrap().kind, ErrorKind::QueryEmpty);
        assert_eq!(ctx.bind(None).unwrap_err().kind, ErrorKind::QueryEmpty);
    }

    #[test]
    fn bind_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = vocbase(&dir);

        let mut ctx = AqlContext::new(Arc::clone(&vocbase), "q", false, None);
        ctx.validate(&parse_users).unwrap();
        let err = ctx.bind(Some(&json!({"@coll": "users"}))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::QueryBindParameterMissing);

        let mut ctx = AqlContext::new(Arc::clone(&vocbase), "q", false, None);
        ctx.validate(&parse_users).unwrap();
        ctx.bind(Some(&json!({"@coll": "nowhere", "min": 1}))).unwrap();
        let err = ctx.setup_collections().err().unwrap();
        assert_eq!(err.kind, ErrorKind::CollectionNotFound);
    }

    #[test]
    fn one_modification_per_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AqlContext::new(vocbase(&dir), "q", false, None);
        let twice = |ctx: &mut AqlContext| -> Result<()> {
            let log = ctx.collection_node("log")?;
            ctx.set_write_operation(QueryType::Remove, log, None)?;
            ctx.set_write_operation(QueryType::Update, log, None)
        };
        assert_eq!(ctx.validate(&twice).unwrap_err().kind, ErrorKind::QueryMultiModify);
        assert_eq!(ctx.query_type(), QueryType::Remove);
    }

    #[test]
    fn redeclared_variables_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = AqlContext::new(vocbase(&dir), "q", false, None);
        let parser = |ctx: &mut AqlContext| -> Result<()> {
            let one = ctx.create_node(Node::Value(json!(1)))?;
            ctx.add_variable("x", one)?;
            ctx.start_scope(ScopeKind::Subquery)?;
            ctx.add_variable("x", one)
        };
        assert_eq!(ctx.validate(&parser).unwrap_err().kind, ErrorKind::QueryVariableRedeclared);
    }

    #[test]
    fn options_and_arena_memory() {
        let dir = tempfile::tempdir().unwrap();
        let vocbase = vocbase(&dir);
        let zone = Arc::clone(&vocbase.zones().unknown);
        let baseline = zone.current_usage();
        {
            let mut ctx = AqlContext::new(Arc::clone(&vocbase), "q", true, Some(json!({"fullCount": true, "ttl": 5})));
            assert!(ctx.full_count());
            assert!(ctx.is_coordinator());
            assert_eq!(ctx.get_option("ttl"), Some(&json!(5)));
            assert_eq!(ctx.get_option("none"), None);

            let name = ctx.register_string3("a", ".", "b").unwrap();
            assert_eq!(ctx.string(name), "a.b");
            let generated = ctx.next_variable_name().unwrap();
            assert_eq!(ctx.string(generated), "_1");
            ctx.create_node(Node::Nop).unwrap();
            assert!(zone.current_usage() >= baseline + ctx.memory());
        }
        assert_eq!(zone.current_usage(), baseline);
    }
}
