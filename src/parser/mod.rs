pub mod chunker;
pub mod class;
pub mod imports;
pub mod normalize;
pub mod scope;
pub mod signature;
pub mod span;
pub mod syntax;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Code chunk representing one retrievable unit (function, class or method)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub name: String,
    /// Enclosing class, set for methods
    pub owning_class: Option<String>,
    pub owning_class_docstring: Option<String>,
    /// Dedented source of the definition, decorators excluded
    pub source_text: String,
    /// 1-based, inclusive
    pub start_line: usize,
    pub end_line: usize,
    pub docstring: Option<String>,
    pub filepath: String,
    pub filename: String,
    pub detail: ChunkDetail,
}

impl Chunk {
    pub fn function(&self) -> Option<&FunctionDetail> {
        match &self.detail {
            ChunkDetail::Function(detail) => Some(detail),
            ChunkDetail::Class(_) => None,
        }
    }

    pub fn class(&self) -> Option<&ClassDetail> {
        match &self.detail {
            ChunkDetail::Class(detail) => Some(detail),
            ChunkDetail::Function(_) => None,
        }
    }

    pub fn is_async(&self) -> bool {
        self.function().map_or(false, |f| f.is_async)
    }

    pub fn is_static(&self) -> bool {
        self.function().map_or(false, |f| f.is_static)
    }

    pub fn is_classmethod(&self) -> bool {
        self.function().map_or(false, |f| f.is_classmethod)
    }

    pub fn is_property(&self) -> bool {
        self.function().map_or(false, |f| f.is_property)
    }
}

/// Type of chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    AsyncFunction,
    Class,
    Method,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::AsyncFunction => "async_function",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
        }
    }
}

/// Kind-specific metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "detail", rename_all = "snake_case")]
pub enum ChunkDetail {
    Function(FunctionDetail),
    Class(ClassDetail),
}

/// Metadata of a function, async function or method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDetail {
    pub is_async: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
    pub is_property: bool,
    pub decorators: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub return_annotation: Option<String>,
    pub calls_functions: BTreeSet<String>,
    pub accesses_attributes: BTreeSet<String>,
    pub imports_used: BTreeSet<String>,
    pub raises_exceptions: BTreeSet<String>,
    pub overrides_method: bool,
    pub complexity_score: u32,
}

/// Metadata of a class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDetail {
    pub base_classes: Vec<String>,
    pub methods: Vec<String>,
    pub is_abstract: bool,
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Variadic parameters keep their marker (`*args`, `**kwargs`)
    pub name: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            default_value: None,
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Positional,
    /// Declared after `*` or `*args`
    KeywordOnly,
    VarPositional,
    VarKeyword,
}
