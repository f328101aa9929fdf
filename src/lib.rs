//! AST-based chunking of Python source trees.
//!
//! Each top-level function, class and method of a file becomes a [`Chunk`]
//! carrying its source text, location and structural metadata: decorators,
//! parameters, referenced calls and attributes, used imports, raised
//! exceptions, override detection and a complexity score. Chunks feed an
//! [`Indexer`] for retrieval.
//!
//! ```no_run
//! use code_context_chunker::{chunk_repository, ChunkerConfig};
//! use std::path::Path;
//!
//! let report = chunk_repository(Path::new("./service"), &ChunkerConfig::default())?;
//! for chunk in &report.chunks {
//!     println!("{} {}:{}", chunk.kind.as_str(), chunk.filepath, chunk.name);
//! }
//! # Ok::<(), code_context_chunker::ChunkError>(())
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod parser;
pub mod repository;
pub mod telemetry;

pub use config::ChunkerConfig;
pub use error::{ChunkError, Result};
pub use index::{chunk_id, document_text, flat_metadata, Indexer, MemoryIndex, ScoredChunk};
pub use parser::chunker::PythonChunker;
pub use parser::normalize::normalize_source;
pub use parser::{
    Chunk, ChunkDetail, ChunkKind, ClassDetail, FunctionDetail, Parameter, ParameterKind,
};
pub use repository::{
    chunk_repository, chunk_repository_concurrent, source_files, ChunkReport, FileWarning,
};
pub use telemetry::init_tracing;
