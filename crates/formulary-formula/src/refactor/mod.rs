//! Scope-aware identifier renaming.
//!
//! The renamer walks the CST with the set of names bound by enclosing `LET`
//! and `LAMBDA` forms. A bound name is never renamed, and declaration tokens
//! are never looked up in the rename map. Scopes are values: entering a
//! binding form builds a new scope, so sibling arguments never observe each
//! other's bindings.

use crate::parser::{parse, serialize, FunctionCall, Node};
use crate::tokenizer::Token;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Old identifier to new identifier
pub type RenameMap = HashMap<String, String>;

/// Names bound by enclosing `LET` / `LAMBDA` forms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    names: HashSet<String>,
}

impl Scope {
    /// An empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// A new scope that also binds `name`
    pub fn with(&self, name: &str) -> Self {
        let mut names = self.names.clone();
        names.insert(name.to_string());
        Self { names }
    }

    /// Number of bound names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Applies a rename map to formula text
#[derive(Debug, Clone, Copy)]
pub struct Renamer<'m> {
    map: &'m RenameMap,
}

impl<'m> Renamer<'m> {
    /// Create a renamer for `map`
    pub fn new(map: &'m RenameMap) -> Self {
        Self { map }
    }

    /// Rewrite `formula`, leaving everything but renamed identifiers byte-identical
    pub fn rename(&self, formula: &str) -> String {
        if self.map.is_empty() {
            return formula.to_string();
        }
        let nodes = parse(formula);
        serialize(&self.transform_nodes(&nodes, &Scope::new()))
    }

    /// Rename a node sequence under `scope`
    pub fn transform_nodes(&self, nodes: &[Node], scope: &Scope) -> Vec<Node> {
        nodes.iter().map(|node| self.transform(node, scope)).collect()
    }

    /// Rename one node under `scope`
    pub fn transform(&self, node: &Node, scope: &Scope) -> Node {
        match node {
            Node::Token(token) => Node::Token(self.transform_token(token, scope)),
            Node::Call(call) => Node::Call(self.transform_call(call, scope)),
        }
    }

    fn transform_token(&self, token: &Token, scope: &Scope) -> Token {
        if !token.is_identifier() || scope.contains(&token.text) {
            return token.clone();
        }
        match self.map.get(&token.text) {
            Some(alias) => {
                trace!(from = %token.text, to = %alias, offset = token.start, "renamed identifier");
                token.with_text(alias.as_str())
            },
            None => token.clone(),
        }
    }

    fn transform_call(&self, call: &FunctionCall, scope: &Scope) -> FunctionCall {
        if call.is_named("LET") {
            return self.transform_let(call, scope);
        }
        if call.is_named("LAMBDA") {
            return self.transform_lambda(call, scope);
        }

        FunctionCall {
            name: self.transform_token(&call.name, scope),
            args: call
                .args
                .iter()
                .map(|arg| self.transform_nodes(arg, scope))
                .collect(),
            ..call.clone()
        }
    }

    /// `LET(name1, value1, ..., expr)`: each value sees only earlier names
    fn transform_let(&self, call: &FunctionCall, scope: &Scope) -> FunctionCall {
        let count = call.args.len();
        let mut current = scope.clone();
        let mut args = Vec::with_capacity(count);

        let mut i = 0;
        while i < count {
            let arg = &call.args[i];
            if i == count - 1 {
                args.push(self.transform_nodes(arg, &current));
                break;
            }

            // Declaration slice is kept verbatim
            args.push(arg.clone());
            let declared = declared_name(arg);

            if let Some(value) = call.args.get(i + 1) {
                args.push(self.transform_nodes(value, &current));
                if let Some(name) = declared {
                    current = current.with(name);
                }
            }
            i += 2;
        }

        FunctionCall {
            args,
            ..call.clone()
        }
    }

    /// `LAMBDA(param1, ..., expr)`: every parameter is bound in `expr`
    fn transform_lambda(&self, call: &FunctionCall, scope: &Scope) -> FunctionCall {
        let Some((body, params)) = call.args.split_last() else {
            return call.clone();
        };

        let inner = params
            .iter()
            .filter_map(|param| declared_name(param))
            .fold(scope.clone(), |acc, name| acc.with(name));

        let mut args: Vec<Vec<Node>> = params.to_vec();
        args.push(self.transform_nodes(body, &inner));

        FunctionCall {
            args,
            ..call.clone()
        }
    }
}

/// The first identifier leaf of a declaration slice
fn declared_name(slice: &[Node]) -> Option<&str> {
    slice.iter().find_map(|node| match node {
        Node::Token(token) if token.is_identifier() => Some(token.text.as_str()),
        _ => None,
    })
}

/// Rename identifiers in `formula` according to `map`
pub fn refactor(formula: &str, map: &RenameMap) -> String {
    Renamer::new(map).rename(formula)
}

#[cfg(test)]
mod tests;
