//! Closed view over the tree-sitter Python grammar.
//!
//! Visitors in this crate never test node kinds directly. They classify a node
//! with [`Syntax::of`] and lower expressions they want to render with
//! [`Expr::lower`], so adding a construct means adding a variant here and
//! letting the compiler point at every match that needs to learn about it.

use tree_sitter::Node;

/// Source text of a node, empty when the range is not valid UTF-8
pub(crate) fn text<'s>(node: Node, src: &'s [u8]) -> &'s str {
    node.utf8_text(src).unwrap_or("")
}

/// First named child that is not a comment
pub(crate) fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

/// Visit every descendant of `node` in document order, excluding `node` itself.
pub(crate) fn walk_descendants<'t>(node: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    if !cursor.goto_first_child() {
        return;
    }
    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() || cursor.node().id() == node.id() {
                return;
            }
        }
    }
}

/// 1-based inclusive line range of a node; trailing comments are not part of it
pub(crate) fn line_span(node: Node) -> (usize, usize) {
    let start = node.start_position().row + 1;
    let end_pos = code_end(node);
    let mut end = end_pos.row + 1;
    // A node ending at column 0 stops before that line starts.
    if end_pos.column == 0 && end > start {
        end -= 1;
    }
    (start, end)
}

/// End of the last token that is not a comment
fn code_end(node: Node) -> tree_sitter::Point {
    let mut last = node;
    loop {
        let mut cursor = last.walk();
        let child = last
            .children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .last();
        match child {
            Some(child) => last = child,
            None => return last.end_position(),
        }
    }
}

/// Line of the first node that makes the file invalid Python 3: an ERROR or
/// MISSING node, or a statement only Python 2 accepts
pub(crate) fn first_rejected_line(root: Node) -> Option<usize> {
    let mut line = None;
    walk_descendants(root, |node| {
        let rejected = node.is_error()
            || node.is_missing()
            || matches!(Syntax::of(node), Syntax::Python2Statement);
        if line.is_none() && rejected {
            line = Some(node.start_position().row + 1);
        }
    });
    line
}

/// Short-circuit boolean operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// The Python constructs the analyzer reacts to
#[derive(Debug, Clone, Copy)]
pub enum Syntax<'t> {
    Function(Node<'t>),
    Class(Node<'t>),
    Decorated(Node<'t>),
    Call { function: Node<'t> },
    Attribute(Node<'t>),
    Raise { exception: Option<Node<'t>> },
    /// `if` or `elif`
    Branch,
    /// `for`, `async for` or `while`
    Loop,
    /// `except` clause
    Handler,
    BoolOp(BoolOperator),
    Import(Node<'t>),
    ImportFrom(Node<'t>),
    FutureImport(Node<'t>),
    /// `print x` or `exec code`, which tree-sitter accepts but Python 3 does not
    Python2Statement,
    Other,
}

impl<'t> Syntax<'t> {
    pub fn of(node: Node<'t>) -> Self {
        match node.kind() {
            "function_definition" => Self::Function(node),
            "class_definition" => Self::Class(node),
            "decorated_definition" => Self::Decorated(node),
            "call" => match node.child_by_field_name("function") {
                Some(function) => Self::Call { function },
                None => Self::Other,
            },
            "attribute" => Self::Attribute(node),
            "raise_statement" => Self::Raise {
                exception: first_named_child(node).filter(|n| {
                    node.child_by_field_name("cause")
                        .map_or(true, |cause| cause.id() != n.id())
                }),
            },
            "if_statement" | "elif_clause" => Self::Branch,
            "for_statement" | "while_statement" => Self::Loop,
            "except_clause" | "except_group_clause" => Self::Handler,
            "boolean_operator" => node
                .child_by_field_name("operator")
                .and_then(|op| match op.kind() {
                    "and" => Some(Self::BoolOp(BoolOperator::And)),
                    "or" => Some(Self::BoolOp(BoolOperator::Or)),
                    _ => None,
                })
                .unwrap_or(Self::Other),
            "import_statement" => Self::Import(node),
            "import_from_statement" => Self::ImportFrom(node),
            "future_import_statement" => Self::FutureImport(node),
            "print_statement" | "exec_statement" => Self::Python2Statement,
            _ => Self::Other,
        }
    }
}

/// Kind of a chunkable definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Function,
    AsyncFunction,
    Class,
}

/// A `def`, `async def` or `class`, unwrapped from its decorators
#[derive(Debug, Clone)]
pub struct Definition<'t> {
    pub node: Node<'t>,
    pub decorators: Vec<Node<'t>>,
    pub kind: DefinitionKind,
}

impl<'t> Definition<'t> {
    pub fn of(node: Node<'t>) -> Option<Self> {
        match Syntax::of(node) {
            Syntax::Function(def) => {
                let is_async = def.child(0).map_or(false, |c| c.kind() == "async");
                Some(Self {
                    node: def,
                    decorators: Vec::new(),
                    kind: if is_async {
                        DefinitionKind::AsyncFunction
                    } else {
                        DefinitionKind::Function
                    },
                })
            }
            Syntax::Class(def) => Some(Self {
                node: def,
                decorators: Vec::new(),
                kind: DefinitionKind::Class,
            }),
            Syntax::Decorated(wrapper) => {
                let mut def = Self::of(wrapper.child_by_field_name("definition")?)?;
                let mut cursor = wrapper.walk();
                def.decorators = wrapper
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .collect();
                Some(def)
            }
            _ => None,
        }
    }

    pub fn name<'s>(&self, src: &'s [u8]) -> Option<&'s str> {
        self.node
            .child_by_field_name("name")
            .map(|n| text(n, src))
            .filter(|n| !n.is_empty())
    }

    pub fn body(&self) -> Option<Node<'t>> {
        self.node.child_by_field_name("body")
    }

    pub fn docstring(&self, src: &[u8]) -> Option<String> {
        self.body().and_then(|body| docstring(body, src))
    }
}

/// Expression shapes the analyzer can render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call { func: Box<Expr> },
    Subscript { value: Box<Expr>, slice: Vec<Expr> },
    List(Vec<Expr>),
    /// Literal already rendered as Python `repr`
    Literal(String),
    /// PEP 604 `A | B`
    Union(Box<Expr>, Box<Expr>),
    Opaque,
}

impl Expr {
    pub fn lower(node: Node, src: &[u8]) -> Self {
        match node.kind() {
            "identifier" => Self::Name(text(node, src).to_string()),
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => Self::Attribute {
                    value: Box::new(Self::lower(object, src)),
                    attr: text(attr, src).to_string(),
                },
                _ => Self::Opaque,
            },
            "call" => node
                .child_by_field_name("function")
                .map_or(Self::Opaque, |f| Self::Call {
                    func: Box::new(Self::lower(f, src)),
                }),
            "subscript" => {
                let Some(value) = node.child_by_field_name("value") else {
                    return Self::Opaque;
                };
                let mut cursor = node.walk();
                let slice = node
                    .children_by_field_name("subscript", &mut cursor)
                    .map(|s| Self::lower(s, src))
                    .collect();
                Self::Subscript {
                    value: Box::new(Self::lower(value, src)),
                    slice,
                }
            }
            "list" => {
                let mut cursor = node.walk();
                let items = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() != "comment")
                    .map(|c| Self::lower(c, src))
                    .collect();
                Self::List(items)
            }
            "parenthesized_expression" | "type" => {
                first_named_child(node).map_or(Self::Opaque, |inner| Self::lower(inner, src))
            }
            "string" | "concatenated_string" => string_literal(node, src)
                .map_or(Self::Opaque, |lit| Self::Literal(lit.repr())),
            "integer" | "float" | "true" | "false" | "none" | "ellipsis" => {
                Self::Literal(text(node, src).to_string())
            }
            "unary_operator" => match node.child_by_field_name("argument") {
                Some(arg) if matches!(arg.kind(), "integer" | "float") => {
                    Self::Literal(text(node, src).split_whitespace().collect())
                }
                _ => Self::Opaque,
            },
            "binary_operator" => {
                let is_union = node
                    .child_by_field_name("operator")
                    .map_or(false, |op| op.kind() == "|");
                match (
                    is_union,
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    (true, Some(left), Some(right)) => Self::Union(
                        Box::new(Self::lower(left, src)),
                        Box::new(Self::lower(right, src)),
                    ),
                    _ => Self::Opaque,
                }
            }
            _ => Self::Opaque,
        }
    }

    /// Dotted path of a name or attribute chain; calls inside the chain render as `name()`
    pub fn dotted(&self) -> Option<String> {
        match self {
            Self::Name(id) => Some(id.clone()),
            Self::Attribute { value, attr } => {
                let base = match value.as_ref() {
                    Self::Call { func } => format!("{}()", func.dotted()?),
                    other => other.dotted()?,
                };
                Some(format!("{base}.{attr}"))
            }
            _ => None,
        }
    }

    /// Rendering used for annotations and default values
    pub fn annotation(&self) -> Option<String> {
        self.render(false)
    }

    /// List displays only render as subscript arguments (`Callable[[int], str]`)
    fn render(&self, in_subscript: bool) -> Option<String> {
        match self {
            Self::Name(_) | Self::Attribute { .. } => self.dotted(),
            Self::Subscript { value, slice } => {
                let args = slice
                    .iter()
                    .map(|arg| arg.render(true))
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("{}[{}]", value.render(false)?, args.join(", ")))
            }
            Self::List(items) if in_subscript => {
                let items = items
                    .iter()
                    .map(|item| item.render(true))
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("[{}]", items.join(", ")))
            }
            Self::Literal(repr) => Some(repr.clone()),
            Self::Union(left, right) => Some(format!(
                "{} | {}",
                left.render(in_subscript)?,
                right.render(in_subscript)?
            )),
            Self::List(_) | Self::Call { .. } | Self::Opaque => None,
        }
    }

    /// Last segment of a name or attribute
    pub fn bare_name(&self) -> Option<String> {
        match self {
            Self::Name(id) => Some(id.clone()),
            Self::Attribute { attr, .. } => Some(attr.clone()),
            _ => None,
        }
    }
}

/// Decoded value of a (possibly implicitly concatenated) string literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub value: String,
    pub is_bytes: bool,
}

impl StringLiteral {
    /// Python `repr` of the literal
    pub fn repr(&self) -> String {
        let quote = if self.value.contains('\'') && !self.value.contains('"') {
            '"'
        } else {
            '\''
        };
        let mut out = String::with_capacity(self.value.len() + 3);
        if self.is_bytes {
            out.push('b');
        }
        out.push(quote);
        for c in self.value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c if (c as u32) < 0x20 || c == '\x7f' => {
                    out.push_str(&format!("\\x{:02x}", c as u32));
                }
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }
}

/// Decode a `string` or `concatenated_string` node; f-strings are not literals
pub(crate) fn string_literal(node: Node, src: &[u8]) -> Option<StringLiteral> {
    match node.kind() {
        "string" => parse_string_token(text(node, src)),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let parts = node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "string")
                .map(|c| parse_string_token(text(c, src)))
                .collect::<Option<Vec<_>>>()?;
            let is_bytes = parts.first()?.is_bytes;
            Some(StringLiteral {
                value: parts.into_iter().map(|p| p.value).collect(),
                is_bytes,
            })
        }
        _ => None,
    }
}

fn parse_string_token(raw: &str) -> Option<StringLiteral> {
    let quote_at = raw.find(|c| c == '"' || c == '\'')?;
    let prefix = raw[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') {
        return None;
    }

    let body = &raw[quote_at..];
    let delim = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        &body[..3]
    } else {
        &body[..1]
    };
    if body.len() < 2 * delim.len() || !body.ends_with(delim) {
        return None;
    }
    let inner = &body[delim.len()..body.len() - delim.len()];

    let value = if prefix.contains('r') {
        inner.to_string()
    } else {
        unescape(inner)
    };
    Some(StringLiteral {
        value,
        is_bytes: prefix.contains('b'),
    })
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\n') => {}
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some(kind @ ('x' | 'u' | 'U')) => {
                let width = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next_if(char::is_ascii_hexdigit)).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&digits);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Leading string literal of a block, cleaned like `inspect.cleandoc`
pub(crate) fn docstring(body: Node, src: &[u8]) -> Option<String> {
    let first = first_named_child(body)?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let literal = string_literal(first.named_child(0)?, src)?;
    if literal.is_bytes {
        return None;
    }
    Some(clean_docstring(&literal.value))
}

pub(crate) fn clean_docstring(raw: &str) -> String {
    let expanded: Vec<String> = raw.split('\n').map(expand_tabs).collect();

    let margin = expanded
        .iter()
        .skip(1)
        .filter_map(|line| {
            let content = line.trim_start();
            (!content.is_empty()).then(|| line.len() - content.len())
        })
        .min();

    let mut lines: Vec<&str> = expanded
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                return line.trim_start();
            }
            match margin {
                Some(m) => line.get(m..).unwrap_or_else(|| line.trim_start()),
                None => line.as_str(),
            }
        })
        .collect();

    while lines.last().map_or(false, |l| l.trim().is_empty()) {
        lines.pop();
    }
    let leading_blank = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..leading_blank);

    lines.join("\n")
}

fn expand_tabs(line: &str) -> String {
    const TAB_SIZE: usize = 8;
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB_SIZE - column % TAB_SIZE;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(code: &str) -> Tree {
        let mut parser = Parser::new();
        parser.set_language(tree_sitter_python::language()).unwrap();
        parser.parse(code, None).unwrap()
    }

    /// Lower the expression of the first expression statement
    fn lower_first(code: &str) -> Expr {
        let tree = parse(code);
        let stmt = tree.root_node().named_child(0).unwrap();
        Expr::lower(stmt.named_child(0).unwrap(), code.as_bytes())
    }

    #[test]
    fn dotted_attribute_chain() {
        let expr = lower_first("self.logger.info\n");
        assert_eq!(expr.dotted().as_deref(), Some("self.logger.info"));
    }

    #[test]
    fn call_inside_attribute_chain() {
        let expr = lower_first("super().area\n");
        assert_eq!(expr.dotted().as_deref(), Some("super().area"));

        let expr = lower_first("items[0].name\n");
        assert_eq!(expr.dotted(), None);
    }

    #[test]
    fn subscript_annotations() {
        assert_eq!(lower_first("List[int]\n").annotation().as_deref(), Some("List[int]"));
        assert_eq!(
            lower_first("Dict[str, Optional[int]]\n").annotation().as_deref(),
            Some("Dict[str, Optional[int]]")
        );
        assert_eq!(
            lower_first("Callable[[int], str]\n").annotation().as_deref(),
            Some("Callable[[int], str]")
        );
        assert_eq!(lower_first("str | None\n").annotation().as_deref(), Some("str | None"));
    }

    #[test]
    fn literal_reprs() {
        assert_eq!(lower_first("\"hello\"\n").annotation().as_deref(), Some("'hello'"));
        assert_eq!(lower_first("\"it's\"\n").annotation().as_deref(), Some("\"it's\""));
        assert_eq!(lower_first("b'raw'\n").annotation().as_deref(), Some("b'raw'"));
        assert_eq!(lower_first("None\n").annotation().as_deref(), Some("None"));
        assert_eq!(lower_first("-1\n").annotation().as_deref(), Some("-1"));
        assert_eq!(lower_first("f'{x}'\n").annotation(), None);
        assert_eq!(lower_first("'a\\tb'\n").annotation().as_deref(), Some("'a\\tb'"));
    }

    #[test]
    fn classifies_boolean_operators() {
        let code = "a and b\n";
        let tree = parse(code);
        let expr = tree.root_node().named_child(0).unwrap().named_child(0).unwrap();
        assert!(matches!(Syntax::of(expr), Syntax::BoolOp(BoolOperator::And)));
    }

    #[test]
    fn decorated_definition_unwraps() {
        let code = "@app.route('/x')\n@staticmethod\nasync def handler():\n    pass\n";
        let tree = parse(code);
        let def = Definition::of(tree.root_node().named_child(0).unwrap()).unwrap();
        assert_eq!(def.kind, DefinitionKind::AsyncFunction);
        assert_eq!(def.decorators.len(), 2);
        assert_eq!(def.name(code.as_bytes()), Some("handler"));
        assert_eq!(line_span(def.node), (3, 4));
    }

    #[test]
    fn trailing_comment_is_outside_span() {
        let code = "class A:\n    def f(self):\n        pass\n        # trailing note\n\nx = 1\n";
        let tree = parse(code);
        let class = tree.root_node().named_child(0).unwrap();
        assert_eq!(line_span(class), (1, 3));
    }

    #[test]
    fn python2_statements_are_rejected() {
        let tree = parse("def greet(name):\n    print \"hello\", name\n");
        assert!(!tree.root_node().has_error());
        assert_eq!(first_rejected_line(tree.root_node()), Some(2));

        let tree = parse("def run(code):\n    exec code\n");
        assert_eq!(first_rejected_line(tree.root_node()), Some(2));

        let tree = parse("def greet(name):\n    print('hello', name)\n    exec(name)\n");
        assert_eq!(first_rejected_line(tree.root_node()), None);
    }

    #[test]
    fn walk_stays_inside_node() {
        let code = "def f():\n    g()\n\nh()\n";
        let tree = parse(code);
        let def = tree.root_node().named_child(0).unwrap();
        let mut calls = 0;
        walk_descendants(def, |n| {
            if n.kind() == "call" {
                calls += 1;
            }
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn docstring_is_cleaned() {
        let code = "def f():\n    \"\"\"Summary.\n\n        Details here.\n    \"\"\"\n    return 1\n";
        let tree = parse(code);
        let def = Definition::of(tree.root_node().named_child(0).unwrap()).unwrap();
        assert_eq!(
            def.docstring(code.as_bytes()).as_deref(),
            Some("Summary.\n\nDetails here.")
        );
    }

    #[test]
    fn no_docstring_without_leading_string() {
        let code = "def f():\n    x = 1\n    \"\"\"not a docstring\"\"\"\n";
        let tree = parse(code);
        let def = Definition::of(tree.root_node().named_child(0).unwrap()).unwrap();
        assert_eq!(def.docstring(code.as_bytes()), None);
    }

    #[test]
    fn clean_docstring_single_line() {
        assert_eq!(clean_docstring("  Return the area.  "), "Return the area.  ");
        assert_eq!(clean_docstring("\n    Indented.\n    "), "Indented.");
    }

    #[test]
    fn unescapes_sequences() {
        assert_eq!(unescape(r"a\nb\x41é\q"), "a\nbAé\\q");
    }
}
