use super::syntax::{first_named_child, text, Expr};
use super::{Parameter, ParameterKind};
use tree_sitter::Node;

/// Render decorators: names and dotted paths verbatim, calls as `callee()`
pub fn decorator_names(decorators: &[Node], src: &[u8]) -> Vec<String> {
    decorators
        .iter()
        .filter_map(|decorator| first_named_child(*decorator))
        .filter_map(|expr| match Expr::lower(expr, src) {
            Expr::Call { func } => func.dotted().map(|name| format!("{name}()")),
            other => other.dotted(),
        })
        .collect()
}

/// Flags derived from the rendered decorator list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoratorFlags {
    pub is_static: bool,
    pub is_classmethod: bool,
    pub is_property: bool,
}

impl DecoratorFlags {
    pub fn from_names(names: &[String]) -> Self {
        let has = |wanted: &str| names.iter().any(|n| n == wanted);
        Self {
            is_static: has("staticmethod"),
            is_classmethod: has("classmethod"),
            is_property: has("property"),
        }
    }
}

/// Parameters of a `parameters` node in declaration order
pub fn parameters(params: Node, src: &[u8]) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut keyword_only = false;

    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        let plain = if keyword_only {
            ParameterKind::KeywordOnly
        } else {
            ParameterKind::Positional
        };

        match child.kind() {
            "identifier" => out.push(Parameter::new(text(child, src), plain)),
            "default_parameter" | "typed_default_parameter" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                let mut param = Parameter::new(text(name, src), plain);
                param.type_annotation = annotation_of(child.child_by_field_name("type"), src);
                param.default_value = annotation_of(child.child_by_field_name("value"), src);
                out.push(param);
            }
            "typed_parameter" => {
                let Some(target) = first_named_child(child) else {
                    continue;
                };
                let param = match target.kind() {
                    "identifier" => Some(Parameter::new(text(target, src), plain)),
                    "list_splat_pattern" => {
                        keyword_only = true;
                        splat(target, src, ParameterKind::VarPositional)
                    }
                    "dictionary_splat_pattern" => splat(target, src, ParameterKind::VarKeyword),
                    _ => None,
                };
                if let Some(mut param) = param {
                    param.type_annotation = annotation_of(child.child_by_field_name("type"), src);
                    out.push(param);
                }
            }
            "list_splat_pattern" => {
                keyword_only = true;
                out.extend(splat(child, src, ParameterKind::VarPositional));
            }
            "dictionary_splat_pattern" => {
                out.extend(splat(child, src, ParameterKind::VarKeyword));
            }
            "keyword_separator" | "*" => keyword_only = true,
            _ => {}
        }
    }

    out
}

/// Return annotation of a function definition
pub fn return_annotation(def: Node, src: &[u8]) -> Option<String> {
    annotation_of(def.child_by_field_name("return_type"), src)
}

fn annotation_of(node: Option<Node>, src: &[u8]) -> Option<String> {
    node.and_then(|n| Expr::lower(n, src).annotation())
}

/// `*args` / `**kwargs`; a bare `*` has no name and yields nothing
fn splat(node: Node, src: &[u8], kind: ParameterKind) -> Option<Parameter> {
    let name = first_named_child(node).filter(|n| n.kind() == "identifier")?;
    let marker = match kind {
        ParameterKind::VarKeyword => "**",
        _ => "*",
    };
    Some(Parameter::new(format!("{marker}{}", text(name, src)), kind))
}
