use std::collections::HashMap;

use crate::aql::arena::NodeId;
use crate::aql::node::ScopeKind;
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    variables: HashMap<String, NodeId>,
}

/// Open scopes of a query, innermost last. The main scope is always open.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
    variable_index: usize,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope { kind: ScopeKind::Main, variables: HashMap::new() }],
            variable_index: 0,
        }
    }

    pub fn start(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind, variables: HashMap::new() });
    }

    /// Closes the innermost scope. The main scope cannot be closed.
    pub fn end(&mut self) -> Result<ScopeKind> {
        if self.scopes.len() == 1 {
            return Err(Error::new(ErrorKind::Internal, "cannot close the main scope"));
        }
        self.scopes
            .pop()
            .map(|scope| scope.kind)
            .ok_or_else(|| Error::new(ErrorKind::Internal, "no scope open"))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current(&self) -> ScopeKind {
        self.scopes.last().map_or(ScopeKind::Main, |scope| scope.kind)
    }

    /// Declares a variable in the innermost scope. Names visible from there may
    /// not be declared again.
    pub fn add_variable(&mut self, name: &str, definition: NodeId) -> Result<()> {
        if self.lookup(name).is_some() {
            return Err(Error::new(
                ErrorKind::QueryVariableRedeclared,
                format!("variable '{}' is assigned multiple times", name),
            ));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.variables.insert(name.to_string(), definition);
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.scopes.iter().rev().find_map(|scope| scope.variables.get(name).copied())
    }

    /// A fresh name for a variable the query did not name itself.
    pub fn next_variable_name(&mut self) -> String {
        self.variable_index += 1;
        format!("_{}", self.variable_index)
    }
}
