use super::class::{method_definitions, ClassHierarchy, ClassShape};
use super::imports::ImportTable;
use super::scope::{complexity, ScopeFacts};
use super::signature::{decorator_names, parameters, return_annotation, DecoratorFlags};
use super::span::extract_span;
use super::syntax::{first_rejected_line, line_span, Definition, DefinitionKind};
use super::{Chunk, ChunkDetail, ChunkKind, ClassDetail, FunctionDetail};
use crate::config::ChunkerConfig;
use crate::error::{ChunkError, Result};
use std::path::Path;
use tree_sitter::Parser;

/// Python chunker using tree-sitter for AST-based chunking
pub struct PythonChunker {
    parser: Parser,
    config: ChunkerConfig,
}

impl PythonChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(tree_sitter_python::language())
            .map_err(|e| ChunkError::Language(e.to_string()))?;

        Ok(Self { parser, config })
    }

    /// Read, decode and chunk one file
    pub fn chunk_file(&mut self, path: &Path) -> Result<Vec<Chunk>> {
        let bytes = std::fs::read(path).map_err(|e| ChunkError::io(path, e))?;
        let source = String::from_utf8(bytes).map_err(|source| ChunkError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        self.chunk_source(&source, &path.to_string_lossy())
    }

    /// Parse source text and extract chunks
    pub fn chunk_source(&mut self, source: &str, filepath: &str) -> Result<Vec<Chunk>> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ChunkError::syntax(filepath, None))?;
        let root = tree.root_node();
        let rejected = first_rejected_line(root);
        if root.has_error() || rejected.is_some() {
            return Err(ChunkError::syntax(filepath, rejected));
        }

        let mut file = FileContext::new(source, filepath, ImportTable::build(root, source.as_bytes()));
        let mut chunks = Vec::new();

        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            if let Some(def) = Definition::of(node) {
                self.extract_definition(&mut file, &def, &mut chunks);
            }
        }

        tracing::debug!("Chunked {}: {} chunks", filepath, chunks.len());
        Ok(chunks)
    }

    fn extract_definition(&self, file: &mut FileContext, def: &Definition, chunks: &mut Vec<Chunk>) {
        let source = file.source;
        let src = source.as_bytes();
        let Some(name) = def.name(src) else {
            return;
        };

        if self.config.is_excluded(name) {
            tracing::trace!("Skipping excluded definition {}", name);
            return;
        }

        match def.kind {
            DefinitionKind::Function | DefinitionKind::AsyncFunction => {
                chunks.extend(file.function_chunk(def, None));
            }
            DefinitionKind::Class => {
                if self.config.is_skipped_class(name) {
                    tracing::trace!("Skipping class {} in {}", name, file.filepath);
                    return;
                }

                let shape = ClassShape::of(def.node, src);
                file.hierarchy.record(name, shape.base_classes.clone());

                let owner = Owner {
                    name,
                    docstring: def.docstring(src),
                };
                chunks.extend(file.class_chunk(def, shape));

                for method in method_definitions(def.node) {
                    let excluded = method.name(src).map_or(true, |m| self.config.is_excluded(m));
                    if !excluded {
                        chunks.extend(file.function_chunk(&method, Some(&owner)));
                    }
                }
            }
        }
    }
}

/// Class a method belongs to
struct Owner<'s> {
    name: &'s str,
    docstring: Option<String>,
}

/// State scoped to a single file; dropped once the file is chunked
struct FileContext<'s> {
    source: &'s str,
    filepath: &'s str,
    filename: String,
    imports: ImportTable,
    hierarchy: ClassHierarchy,
}

impl<'s> FileContext<'s> {
    fn new(source: &'s str, filepath: &'s str, imports: ImportTable) -> Self {
        let filename = Path::new(filepath)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| filepath.to_string());

        Self {
            source,
            filepath,
            filename,
            imports,
            hierarchy: ClassHierarchy::default(),
        }
    }

    /// Chunk skeleton shared by every kind; `None` when the span is blank
    fn base_chunk(&self, def: &Definition, kind: ChunkKind, detail: ChunkDetail) -> Option<Chunk> {
        let src = self.source.as_bytes();
        let name = def.name(src)?;
        let (start_line, end_line) = line_span(def.node);

        let source_text = extract_span(self.source, start_line, end_line);
        if source_text.trim().is_empty() {
            return None;
        }

        Some(Chunk {
            kind,
            name: name.to_string(),
            owning_class: None,
            owning_class_docstring: None,
            source_text,
            start_line,
            end_line,
            docstring: def.docstring(src),
            filepath: self.filepath.to_string(),
            filename: self.filename.clone(),
            detail,
        })
    }

    fn class_chunk(&self, def: &Definition, shape: ClassShape) -> Option<Chunk> {
        let detail = ClassDetail {
            base_classes: shape.base_classes,
            methods: shape.methods,
            is_abstract: shape.is_abstract,
        };
        self.base_chunk(def, ChunkKind::Class, ChunkDetail::Class(detail))
    }

    fn function_chunk(&self, def: &Definition, owner: Option<&Owner>) -> Option<Chunk> {
        let src = self.source.as_bytes();

        let facts = def
            .body()
            .map(|body| ScopeFacts::collect(body, src))
            .unwrap_or_default();
        let decorators = decorator_names(&def.decorators, src);
        let flags = DecoratorFlags::from_names(&decorators);
        let overrides_method = owner.map_or(false, |o| self.hierarchy.overrides(o.name, &facts));
        let imports_used = self.imports.used_by(&facts);

        let detail = FunctionDetail {
            is_async: def.kind == DefinitionKind::AsyncFunction,
            is_static: flags.is_static,
            is_classmethod: flags.is_classmethod,
            is_property: flags.is_property,
            parameters: def
                .node
                .child_by_field_name("parameters")
                .map(|p| parameters(p, src))
                .unwrap_or_default(),
            return_annotation: return_annotation(def.node, src),
            decorators,
            calls_functions: facts.calls,
            accesses_attributes: facts.attributes,
            imports_used,
            raises_exceptions: facts.exceptions,
            overrides_method,
            complexity_score: complexity(def.node),
        };

        let kind = match (owner, def.kind) {
            (Some(_), _) => ChunkKind::Method,
            (None, DefinitionKind::AsyncFunction) => ChunkKind::AsyncFunction,
            (None, _) => ChunkKind::Function,
        };

        let mut chunk = self.base_chunk(def, kind, ChunkDetail::Function(detail))?;
        if let Some(owner) = owner {
            chunk.owning_class = Some(owner.name.to_string());
            chunk.owning_class_docstring = owner.docstring.clone();
        }
        Some(chunk)
    }
}
