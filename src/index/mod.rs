pub mod memory;

pub use memory::MemoryIndex;

use crate::parser::{Chunk, ChunkDetail};
use anyhow::Result;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const MAX_ID_LEN: usize = 100;

/// Sink for chunks that supports similarity lookup
#[async_trait::async_trait]
pub trait Indexer: Send + Sync {
    /// Add or replace chunks, keyed by [`chunk_id`]
    async fn index(&self, chunks: &[Chunk]) -> Result<()>;

    /// Up to `limit` chunks ordered from most to least similar
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredChunk>>;
}

/// Query hit; lower distance means more similar
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Stable, readable identifier for a chunk
pub fn chunk_id(chunk: &Chunk) -> String {
    let id = format!("{}:{}:{}", chunk.filepath, chunk.start_line, chunk.name);
    if id.chars().count() <= MAX_ID_LEN {
        return id;
    }

    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{}:{}", chunk.name, &digest[..8])
}

/// Text submitted for embedding: owning class context, docstring, then code
pub fn document_text(chunk: &Chunk) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(doc) = &chunk.owning_class_docstring {
        parts.push(format!("# Class docstring: {doc}"));
    }
    if let Some(class) = &chunk.owning_class {
        parts.push(format!("# Class: {class}"));
    }
    if let Some(doc) = &chunk.docstring {
        parts.push(format!("'''{doc}'''"));
    }
    parts.push(chunk.source_text.clone());
    parts.join("\n")
}

/// Scalar-only metadata for stores that cannot hold nested values.
///
/// Source text and docstrings are left out; collections are joined with commas
/// and empty values are dropped.
pub fn flat_metadata(chunk: &Chunk) -> Map<String, Value> {
    let mut meta = Map::new();

    put_str(&mut meta, "kind", chunk.kind.as_str().to_string());
    put_str(&mut meta, "name", chunk.name.clone());
    if let Some(class) = &chunk.owning_class {
        put_str(&mut meta, "owning_class", class.clone());
    }
    put_str(&mut meta, "filepath", chunk.filepath.clone());
    put_str(&mut meta, "filename", chunk.filename.clone());
    meta.insert("start_line".into(), chunk.start_line.into());
    meta.insert("end_line".into(), chunk.end_line.into());

    match &chunk.detail {
        ChunkDetail::Function(f) => {
            meta.insert("is_async".into(), f.is_async.into());
            meta.insert("is_static".into(), f.is_static.into());
            meta.insert("is_classmethod".into(), f.is_classmethod.into());
            meta.insert("is_property".into(), f.is_property.into());
            meta.insert("overrides_method".into(), f.overrides_method.into());
            meta.insert("complexity_score".into(), f.complexity_score.into());

            put_str(&mut meta, "decorators", f.decorators.join(","));
            let params: Vec<String> = f
                .parameters
                .iter()
                .map(|p| format!("{}:{}", p.name, p.type_annotation.as_deref().unwrap_or("")))
                .collect();
            put_str(&mut meta, "parameters", params.join(","));
            if let Some(ret) = &f.return_annotation {
                put_str(&mut meta, "return_annotation", ret.clone());
            }
            put_str(&mut meta, "calls_functions", join(&f.calls_functions));
            put_str(&mut meta, "accesses_attributes", join(&f.accesses_attributes));
            put_str(&mut meta, "imports_used", join(&f.imports_used));
            put_str(&mut meta, "raises_exceptions", join(&f.raises_exceptions));
        }
        ChunkDetail::Class(c) => {
            meta.insert("is_abstract".into(), c.is_abstract.into());
            put_str(&mut meta, "base_classes", c.base_classes.join(","));
            put_str(&mut meta, "methods", c.methods.join(","));
        }
    }

    meta
}

fn put_str(meta: &mut Map<String, Value>, key: &str, value: String) {
    if !value.is_empty() {
        meta.insert(key.to_string(), Value::String(value));
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::{ChunkKind, ClassDetail, FunctionDetail, Parameter, ParameterKind};

    pub(crate) fn method(name: &str, source: &str) -> Chunk {
        Chunk {
            kind: ChunkKind::Method,
            name: name.to_string(),
            owning_class: Some("Cart".to_string()),
            owning_class_docstring: Some("Shopping cart.".to_string()),
            source_text: source.to_string(),
            start_line: 10,
            end_line: 12,
            docstring: Some("Sum prices.".to_string()),
            filepath: "shop/cart.py".to_string(),
            filename: "cart.py".to_string(),
            detail: ChunkDetail::Function(FunctionDetail {
                parameters: vec![
                    Parameter::new("self", ParameterKind::Positional),
                    Parameter {
                        type_annotation: Some("float".to_string()),
                        ..Parameter::new("rate", ParameterKind::Positional)
                    },
                ],
                calls_functions: ["sum".to_string(), "round".to_string()].into_iter().collect(),
                complexity_score: 2,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn short_ids_are_readable() {
        assert_eq!(chunk_id(&method("total", "def total(self): pass")), "shop/cart.py:10:total");
    }

    #[test]
    fn long_ids_are_hashed() {
        let mut chunk = method("total", "def total(self): pass");
        chunk.filepath = format!("{}/cart.py", "deep".repeat(30));
        let id = chunk_id(&chunk);
        let (name, hash) = id.split_once(':').unwrap();
        assert_eq!(name, "total");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, chunk_id(&chunk));
    }

    #[test]
    fn document_text_orders_context_first() {
        let text = document_text(&method("total", "def total(self):\n    pass"));
        assert_eq!(
            text,
            "# Class docstring: Shopping cart.\n# Class: Cart\n'''Sum prices.'''\ndef total(self):\n    pass"
        );
    }

    #[test]
    fn metadata_is_flat() {
        let meta = flat_metadata(&method("total", "def total(self): pass"));
        assert_eq!(meta["kind"], "method");
        assert_eq!(meta["owning_class"], "Cart");
        assert_eq!(meta["parameters"], "self:,rate:float");
        assert_eq!(meta["calls_functions"], "round,sum");
        assert_eq!(meta["complexity_score"], 2);
        assert_eq!(meta["is_async"], false);
        assert!(!meta.contains_key("decorators"));
        assert!(!meta.contains_key("docstring"));
        assert!(!meta.contains_key("source_text"));
        assert!(meta.values().all(|v| !v.is_object() && !v.is_array()));
    }

    #[test]
    fn class_metadata_joins_lists() {
        let chunk = Chunk {
            kind: ChunkKind::Class,
            owning_class: None,
            owning_class_docstring: None,
            detail: ChunkDetail::Class(ClassDetail {
                base_classes: vec!["Base".to_string(), "Mixin".to_string()],
                methods: vec!["total".to_string()],
                is_abstract: false,
            }),
            ..method("Cart", "class Cart(Base, Mixin): pass")
        };
        let meta = flat_metadata(&chunk);
        assert_eq!(meta["base_classes"], "Base,Mixin");
        assert_eq!(meta["methods"], "total");
        assert!(!meta.contains_key("owning_class"));
    }
}
