use super::syntax::{first_rejected_line, string_literal, walk_descendants};
use crate::error::{ChunkError, Result};
use std::collections::HashMap;
use tree_sitter::{Node, Parser};

/// Rewrite a snippet so structurally identical code compares equal.
///
/// Function names become `func_N` and name references `var_N`, numbered by
/// first appearance with separate counters. String literals become
/// `'str_val'` and numeric literals `0`. Declarations that are not plain
/// name references keep their spelling, layout is preserved.
pub fn normalize_source(source: &str) -> Result<String> {
    let mut parser = Parser::new();
    parser
        .set_language(tree_sitter_python::language())
        .map_err(|e| ChunkError::Language(e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ChunkError::syntax("<snippet>", None))?;
    let root = tree.root_node();
    let rejected = first_rejected_line(root);
    if root.has_error() || rejected.is_some() {
        return Err(ChunkError::syntax("<snippet>", rejected));
    }

    let src = source.as_bytes();
    let mut renamer = Renamer::default();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut covered_until = 0;

    walk_descendants(root, |node| {
        if node.start_byte() < covered_until {
            return;
        }
        let replacement = match node.kind() {
            "identifier" => renamer.rename(node, src),
            "string" | "concatenated_string" => string_literal(node, src)
                .filter(|lit| !lit.is_bytes)
                .map(|_| "'str_val'".to_string()),
            "integer" | "float" if !is_imaginary(node, src) => Some("0".to_string()),
            _ => None,
        };
        if let Some(replacement) = replacement {
            covered_until = node.end_byte();
            edits.push((node.start_byte(), node.end_byte(), replacement));
        }
    });

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for (start, end, replacement) in edits {
        out.push_str(&source[last..start]);
        out.push_str(&replacement);
        last = end;
    }
    out.push_str(&source[last..]);

    Ok(out.trim().to_string())
}

#[derive(Default)]
struct Renamer {
    vars: HashMap<String, String>,
    funcs: HashMap<String, String>,
}

impl Renamer {
    fn rename(&mut self, node: Node, src: &[u8]) -> Option<String> {
        let name = node.utf8_text(src).ok()?;
        match role(node) {
            Role::FunctionName => Some(numbered(&mut self.funcs, "func", name)),
            Role::Reference => Some(numbered(&mut self.vars, "var", name)),
            Role::Declaration => None,
        }
    }
}

fn numbered(table: &mut HashMap<String, String>, prefix: &str, name: &str) -> String {
    let next = table.len() + 1;
    table
        .entry(name.to_string())
        .or_insert_with(|| format!("{prefix}_{next}"))
        .clone()
}

enum Role {
    FunctionName,
    Reference,
    Declaration,
}

/// What an identifier denotes, judged from its parent
fn role(node: Node) -> Role {
    let Some(parent) = node.parent() else {
        return Role::Reference;
    };
    let is_field = |field: &str| {
        parent
            .child_by_field_name(field)
            .map_or(false, |n| n.id() == node.id())
    };

    match parent.kind() {
        "function_definition" if is_field("name") => Role::FunctionName,
        "class_definition" if is_field("name") => Role::Declaration,
        "attribute" if is_field("attribute") => Role::Declaration,
        "keyword_argument" if is_field("name") => Role::Declaration,
        "default_parameter" | "typed_default_parameter" if is_field("name") => Role::Declaration,
        "parameters" | "lambda_parameters" | "typed_parameter" => Role::Declaration,
        "list_splat_pattern" | "dictionary_splat_pattern" if is_parameter_splat(parent) => {
            Role::Declaration
        }
        "dotted_name" | "aliased_import" | "global_statement" | "nonlocal_statement" => {
            Role::Declaration
        }
        "as_pattern_target" if is_exception_alias(parent) => Role::Declaration,
        "except_clause" | "except_group_clause"
            if node.prev_sibling().map_or(false, |s| s.kind() == "as") =>
        {
            Role::Declaration
        }
        _ => Role::Reference,
    }
}

fn is_parameter_splat(splat: Node) -> bool {
    splat.parent().map_or(false, |p| {
        matches!(p.kind(), "parameters" | "lambda_parameters" | "typed_parameter")
    })
}

/// `except E as err` binds a plain string, not a name
fn is_exception_alias(target: Node) -> bool {
    target
        .parent()
        .and_then(|pattern| pattern.parent())
        .map_or(false, |clause| {
            matches!(clause.kind(), "except_clause" | "except_group_clause")
        })
}

fn is_imaginary(node: Node, src: &[u8]) -> bool {
    node.utf8_text(src)
        .map_or(false, |t| t.ends_with('j') || t.ends_with('J'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renames_functions_and_names_by_first_appearance() {
        let normalized =
            normalize_source("def add(a, b):\n    total = a + b\n    return total\n").unwrap();
        assert_eq!(
            normalized,
            "def func_1(a, b):\n    var_1 = var_2 + var_3\n    return var_1"
        );
    }

    #[test]
    fn literals_are_replaced() {
        let normalized = normalize_source("label = 'hi' \"there\" * 3 + 2.5\nraw = b'x'\n").unwrap();
        assert_eq!(normalized, "var_1 = 'str_val' * 0 + 0\nvar_2 = b'x'");
    }

    #[test]
    fn attributes_and_keywords_keep_their_names() {
        let normalized = normalize_source("result = client.fetch(url, timeout=5)\n").unwrap();
        assert_eq!(normalized, "var_1 = var_2.fetch(var_3, timeout=0)");
    }

    #[test]
    fn imports_and_class_names_are_untouched() {
        let normalized =
            normalize_source("import os.path\nclass Foo(Base):\n    pass\nos.path.join(p)\n").unwrap();
        assert_eq!(
            normalized,
            "import os.path\nclass Foo(var_1):\n    pass\nvar_2.path.join(var_3)"
        );
    }

    #[test]
    fn equivalent_snippets_normalize_equal() {
        let a = normalize_source("def area(r):\n    return pi * r * r\n").unwrap();
        let b = normalize_source("def size(r):\n    return tau * r * r\n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_snippet_is_syntax_error() {
        let err = normalize_source("def broken(:\n").unwrap_err();
        assert!(matches!(err, ChunkError::Syntax { .. }));
        let err = normalize_source("print 'hi'\n").unwrap_err();
        assert!(matches!(err, ChunkError::Syntax { line: Some(1), .. }));
    }
}
