use super::scope::ScopeFacts;
use super::syntax::{Definition, DefinitionKind, Expr};
use std::collections::HashMap;
use tree_sitter::Node;

/// Syntactic summary of a class declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassShape {
    pub base_classes: Vec<String>,
    pub methods: Vec<String>,
    pub is_abstract: bool,
}

impl ClassShape {
    pub fn of(class: Node, src: &[u8]) -> Self {
        let base_classes: Vec<String> = class
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                let bases = args
                    .named_children(&mut cursor)
                    .filter_map(|arg| Expr::lower(arg, src).dotted())
                    .collect();
                bases
            })
            .unwrap_or_default();

        let methods = method_definitions(class)
            .iter()
            .filter_map(|method| method.name(src))
            .map(str::to_string)
            .collect();

        let is_abstract = base_classes.iter().any(|base| {
            let lower = base.to_lowercase();
            lower.contains("abc") || lower.contains("abstract")
        });

        Self {
            base_classes,
            methods,
            is_abstract,
        }
    }
}

/// Functions declared directly in a class body, decorated or not
pub fn method_definitions(class: Node) -> Vec<Definition> {
    let Some(body) = class.child_by_field_name("body") else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    let methods = body
        .named_children(&mut cursor)
        .filter_map(Definition::of)
        .filter(|def| def.kind != DefinitionKind::Class)
        .collect();
    methods
}

/// Base classes of every class seen so far in one file
#[derive(Debug, Default)]
pub struct ClassHierarchy {
    bases: HashMap<String, Vec<String>>,
}

impl ClassHierarchy {
    /// Record a class; a later class with the same name replaces the earlier entry
    pub fn record(&mut self, class: &str, bases: Vec<String>) {
        self.bases.insert(class.to_string(), bases);
    }

    pub fn bases_of(&self, class: &str) -> &[String] {
        self.bases.get(class).map_or(&[], Vec::as_slice)
    }

    /// A method overrides when its class has bases and its body goes through `super()`
    pub fn overrides(&self, class: &str, facts: &ScopeFacts) -> bool {
        !self.bases_of(class).is_empty() && facts.calls_super()
    }
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

    fn shape(code: &str) -> ClassShape {
        let tree = parse(code);
        ClassShape::of(tree.root_node().named_child(0).unwrap(), code.as_bytes())
    }

    #[test]
    fn extracts_bases_and_methods() {
        let shape = shape(
            "class Circle(shapes.Shape, Mixin, metaclass=Meta):\n    radius = 1\n    def area(self):\n        pass\n    @property\n    def size(self):\n        pass\n    class Inner:\n        pass\n",
        );
        assert_eq!(shape.base_classes, vec!["shapes.Shape", "Mixin"]);
        assert_eq!(shape.methods, vec!["area", "size"]);
        assert!(!shape.is_abstract);
    }

    #[test]
    fn abstract_heuristic_is_case_insensitive() {
        assert!(shape("class Repo(ABC):\n    pass\n").is_abstract);
        assert!(shape("class Repo(abc.ABC):\n    pass\n").is_abstract);
        assert!(shape("class Repo(AbstractBase):\n    pass\n").is_abstract);
        assert!(!shape("class Repo(object):\n    pass\n").is_abstract);
        assert!(!shape("class Repo:\n    pass\n").is_abstract);
    }

    #[test]
    fn hierarchy_overrides_require_bases_and_super() {
        let mut hierarchy = ClassHierarchy::default();
        hierarchy.record("Base", vec![]);
        hierarchy.record("Square", vec!["Base".to_string()]);

        let mut facts = ScopeFacts::default();
        facts.calls.insert("super().area".to_string());

        assert!(hierarchy.overrides("Square", &facts));
        assert!(!hierarchy.overrides("Base", &facts));
        assert!(!hierarchy.overrides("Unknown", &facts));
        assert!(!hierarchy.overrides("Square", &ScopeFacts::default()));
    }

    #[test]
    fn later_class_replaces_entry() {
        let mut hierarchy = ClassHierarchy::default();
        hierarchy.record("A", vec!["X".to_string()]);
        hierarchy.record("A", vec![]);
        assert!(hierarchy.bases_of("A").is_empty());
    }
}
