use super::scope::ScopeFacts;
use super::syntax::{text, walk_descendants, Syntax};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

/// Local alias -> fully qualified name for one file's imports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    imports: BTreeMap<String, String>,
    from_imports: BTreeMap<String, String>,
}

impl ImportTable {
    /// Record every import statement in the file, nested ones included
    pub fn build(root: Node, src: &[u8]) -> Self {
        let mut table = Self::default();
        walk_descendants(root, |node| match Syntax::of(node) {
            Syntax::Import(stmt) => table.record_import(stmt, src),
            Syntax::ImportFrom(stmt) => {
                let module = stmt
                    .child_by_field_name("module_name")
                    .map(|m| module_path(m, src))
                    .unwrap_or_default();
                table.record_from_import(stmt, &module, src);
            }
            Syntax::FutureImport(stmt) => table.record_from_import(stmt, "__future__", src),
            _ => {}
        });
        table
    }

    fn record_import(&mut self, stmt: Node, src: &[u8]) {
        let mut cursor = stmt.walk();
        for name in stmt.children_by_field_name("name", &mut cursor) {
            if let Some((path, alias)) = imported_name(name, src) {
                self.imports.insert(alias.unwrap_or_else(|| path.clone()), path);
            }
        }
    }

    fn record_from_import(&mut self, stmt: Node, module: &str, src: &[u8]) {
        let mut cursor = stmt.walk();
        for name in stmt.children_by_field_name("name", &mut cursor) {
            if let Some((name, alias)) = imported_name(name, src) {
                let full = if module.is_empty() {
                    name.clone()
                } else {
                    format!("{module}.{name}")
                };
                self.from_imports.insert(alias.unwrap_or(name), full);
            }
        }
    }

    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    pub fn from_imports(&self) -> &BTreeMap<String, String> {
        &self.from_imports
    }

    /// Plain and from-imports together; from-imports win on alias collisions
    pub fn merged(&self) -> BTreeMap<&str, &str> {
        self.imports
            .iter()
            .chain(self.from_imports.iter())
            .map(|(alias, full)| (alias.as_str(), full.as_str()))
            .collect()
    }

    /// Imports whose alias prefixes any collected call name or attribute path
    pub fn used_by(&self, facts: &ScopeFacts) -> BTreeSet<String> {
        self.merged()
            .into_iter()
            .filter(|(alias, _)| facts.references().any(|r| r.starts_with(alias)))
            .map(|(_, full)| full.to_string())
            .collect()
    }
}

/// `dotted_name` or `aliased_import` -> (name, alias)
fn imported_name(node: Node, src: &[u8]) -> Option<(String, Option<String>)> {
    match node.kind() {
        "dotted_name" | "identifier" => Some((text(node, src).to_string(), None)),
        "aliased_import" => {
            let name = node.child_by_field_name("name")?;
            let alias = node.child_by_field_name("alias").map(|a| text(a, src).to_string());
            Some((text(name, src).to_string(), alias))
        }
        _ => None,
    }
}

/// Module path of a from-import; relative dots are dropped
fn module_path(node: Node, src: &[u8]) -> String {
    match node.kind() {
        "relative_import" => {
            let mut cursor = node.walk();
            let path = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "dotted_name")
                .map(|c| text(c, src).to_string())
                .unwrap_or_default();
            path
        }
        _ => text(node, src).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tree_sitter::Parser;

    fn table(code: &str) -> ImportTable {
        let mut parser = Parser::new();
        parser.set_language(tree_sitter_python::language()).unwrap();
        let tree = parser.parse(code, None).unwrap();
        ImportTable::build(tree.root_node(), code.as_bytes())
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn plain_imports() {
        let table = table("import os\nimport numpy as np\nimport os.path\n");
        assert_eq!(
            table.imports(),
            &map(&[("os", "os"), ("np", "numpy"), ("os.path", "os.path")])
        );
        assert!(table.from_imports().is_empty());
    }

    #[test]
    fn from_imports() {
        let table = table(
            "from typing import List, Dict as D\nfrom .models import Product\nfrom . import views\nfrom __future__ import annotations\nfrom pkg import *\n",
        );
        assert_eq!(
            table.from_imports(),
            &map(&[
                ("List", "typing.List"),
                ("D", "typing.Dict"),
                ("Product", "models.Product"),
                ("views", "views"),
                ("annotations", "__future__.annotations"),
            ])
        );
    }

    #[test]
    fn nested_imports_are_recorded() {
        let table = table("def f():\n    import json\n    return json.dumps({})\n");
        assert_eq!(table.imports(), &map(&[("json", "json")]));
    }

    #[test]
    fn from_import_wins_on_collision() {
        let table = table("import path\nfrom os import path\n");
        assert_eq!(table.merged().get("path"), Some(&"os.path"));
    }

    #[test]
    fn used_imports_match_by_prefix() {
        let table = table("import json\nimport numpy as np\nfrom typing import List\n");
        let mut facts = ScopeFacts::default();
        facts.calls.insert("json.dumps".to_string());
        facts.attributes.insert("np.nan".to_string());
        facts.calls.insert("jsonify".to_string());

        let expected: BTreeSet<String> = ["json", "numpy"].iter().map(|s| s.to_string()).collect();
        assert_eq!(table.used_by(&facts), expected);
    }
}
