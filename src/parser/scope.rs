use super::syntax::{walk_descendants, BoolOperator, Expr, Syntax};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Names referenced from one function body.
///
/// Built fresh for every function; nothing carries over between scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFacts {
    pub calls: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
    pub exceptions: BTreeSet<String>,
}

impl ScopeFacts {
    /// Collect calls, attribute paths and raised exception names below `body`
    pub fn collect(body: Node, src: &[u8]) -> Self {
        let mut facts = Self::default();
        walk_descendants(body, |node| match Syntax::of(node) {
            Syntax::Call { function } => {
                if let Some(name) = Expr::lower(function, src).dotted() {
                    facts.calls.insert(name);
                }
            }
            Syntax::Attribute(attr) => {
                if let Some(path) = Expr::lower(attr, src).dotted() {
                    facts.attributes.insert(path);
                }
            }
            Syntax::Raise {
                exception: Some(exc),
            } => {
                if let Some(name) = exception_name(&Expr::lower(exc, src)) {
                    facts.exceptions.insert(name);
                }
            }
            Syntax::Raise { exception: None }
            | Syntax::Function(_)
            | Syntax::Class(_)
            | Syntax::Decorated(_)
            | Syntax::Branch
            | Syntax::Loop
            | Syntax::Handler
            | Syntax::BoolOp(_)
            | Syntax::Import(_)
            | Syntax::ImportFrom(_)
            | Syntax::FutureImport(_)
            | Syntax::Python2Statement
            | Syntax::Other => {}
        });
        facts
    }

    /// Whether any call target goes through `super()`
    pub fn calls_super(&self) -> bool {
        self.calls.iter().any(|call| call.contains("super()"))
    }

    /// Every collected call name and attribute path
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.calls
            .iter()
            .chain(self.attributes.iter())
            .map(String::as_str)
    }
}

/// Callee of a raised call, or a bare raised name; anything else is skipped
fn exception_name(raised: &Expr) -> Option<String> {
    match raised {
        Expr::Call { func } => func.bare_name(),
        Expr::Name(id) => Some(id.clone()),
        _ => None,
    }
}

/// Cyclomatic complexity of a definition subtree.
///
/// Starts at 1 and adds one per `if`/`elif`, loop, `except` clause and
/// boolean-operator chain.
pub fn complexity(definition: Node) -> u32 {
    let mut score = 1;
    walk_descendants(definition, |node| match Syntax::of(node) {
        Syntax::Branch | Syntax::Loop | Syntax::Handler => score += 1,
        Syntax::BoolOp(op) if !continues_chain(node, op) => score += 1,
        _ => {}
    });
    score
}

/// `a and b and c` parses as nested operators but is a single combination
fn continues_chain(node: Node, op: BoolOperator) -> bool {
    node.parent()
        .map_or(false, |parent| matches!(Syntax::of(parent), Syntax::BoolOp(outer) if outer == op))
}
