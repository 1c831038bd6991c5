//! Chained lexical scopes.
//!
//! Scopes live in an arena owned by the table and refer to their parent by
//! handle. The same structure binds names to types during checking and to IR
//! variables during lowering.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Scope<T> {
  names: HashMap<String, T>,
  parent: Option<ScopeId>,
}

#[derive(Debug)]
pub struct SymTab<T> {
  scopes: Vec<Scope<T>>,
}

impl<T> SymTab<T> {
  /// A table holding only an empty root scope.
  pub fn new() -> Self {
    Self {
      scopes: vec![Scope {
        names: HashMap::new(),
        parent: None,
      }],
    }
  }

  pub fn root(&self) -> ScopeId {
    ScopeId(0)
  }

  /// Open a new scope nested in `parent`.
  pub fn child(&mut self, parent: ScopeId) -> ScopeId {
    self.scopes.push(Scope {
      names: HashMap::new(),
      parent: Some(parent),
    });
    ScopeId(self.scopes.len() - 1)
  }

  /// Nearest binding of `name`, walking from `scope` towards the root.
  pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&T> {
    let mut current = Some(scope);
    while let Some(id) = current {
      let scope = &self.scopes[id.0];
      if let Some(value) = scope.names.get(name) {
        return Some(value);
      }
      current = scope.parent;
    }
    None
  }

  /// Whether `name` is bound in `scope` itself, ignoring its ancestors.
  pub fn is_local(&self, scope: ScopeId, name: &str) -> bool {
    self.scopes[scope.0].names.contains_key(name)
  }

  pub fn insert(&mut self, scope: ScopeId, name: impl Into<String>, value: T) {
    self.scopes[scope.0].names.insert(name.into(), value);
  }
}

impl<T> Default for SymTab<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T, S: Into<String>> FromIterator<(S, T)> for SymTab<T> {
  /// A table whose root scope holds the given bindings.
  fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
    let mut table = Self::new();
    let root = table.root();
    for (name, value) in iter {
      table.insert(root, name, value);
    }
    table
  }
}
