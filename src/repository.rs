use crate::config::ChunkerConfig;
use crate::error::{ChunkError, Result};
use crate::parser::chunker::PythonChunker;
use crate::parser::Chunk;
use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file the walk skipped, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWarning {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of chunking a source tree
#[derive(Debug, Default)]
pub struct ChunkReport {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<FileWarning>,
    pub files_chunked: usize,
}

impl ChunkReport {
    fn absorb(&mut self, path: &Path, outcome: Result<Vec<Chunk>>) -> Result<()> {
        match outcome {
            Ok(chunks) => {
                self.files_chunked += 1;
                self.chunks.extend(chunks);
            }
            Err(e) if e.is_file_local() => {
                tracing::warn!("Failed to parse {:?}: {}", path, e);
                self.warnings.push(FileWarning {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Files under `root` with a configured extension, in path order
pub fn source_files(root: &Path, config: &ChunkerConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ChunkError::RootNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    if config.respect_ignore_files {
        let walker = WalkBuilder::new(root)
            .standard_filters(true)
            .hidden(true)
            .follow_links(config.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().map_or(false, |ft| ft.is_file()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
            }
        }
    } else {
        let walker = WalkDir::new(root)
            .follow_links(config.follow_links)
            .sort_by_file_name();

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
            }
        }
    }

    files.retain(|path| config.matches_extension(path));
    Ok(files)
}

/// Chunk every source file under `root` one after another.
///
/// Files that cannot be read, decoded or parsed become warnings; only an
/// invalid configuration or a missing root fails the walk.
pub fn chunk_repository(root: &Path, config: &ChunkerConfig) -> Result<ChunkReport> {
    config.validate()?;
    let files = source_files(root, config)?;
    tracing::info!("Chunking {} files under {}", files.len(), root.display());

    let mut chunker = PythonChunker::new(config.clone())?;
    let mut report = ChunkReport::default();
    for path in &files {
        report.absorb(path, chunker.chunk_file(path))?;
    }

    log_summary(root, &report);
    Ok(report)
}

/// Same contract as [`chunk_repository`] with files analysed on the blocking pool.
///
/// At most `max_concurrency` files are in flight; every task builds its own
/// parser. Chunks come back grouped by file in completion order.
pub async fn chunk_repository_concurrent(root: &Path, config: &ChunkerConfig) -> Result<ChunkReport> {
    config.validate()?;
    let files = source_files(root, config)?;
    tracing::info!(
        "Chunking {} files under {} ({} at a time)",
        files.len(),
        root.display(),
        config.max_concurrency
    );

    let mut outcomes = stream::iter(files)
        .map(|path| {
            let config = config.clone();
            async move {
                let task_path = path.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    PythonChunker::new(config)?.chunk_file(&task_path)
                })
                .await;
                (path, outcome)
            }
        })
        .buffer_unordered(config.max_concurrency);

    let mut report = ChunkReport::default();
    while let Some((path, outcome)) = outcomes.next().await {
        match outcome {
            Ok(result) => report.absorb(&path, result)?,
            Err(e) => {
                tracing::warn!("Chunking task for {:?} failed: {}", path, e);
                report.warnings.push(FileWarning {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    log_summary(root, &report);
    Ok(report)
}

fn log_summary(root: &Path, report: &ChunkReport) {
    tracing::info!(
        "Chunked {}: {} chunks from {} files, {} skipped",
        root.display(),
        report.chunks.len(),
        report.files_chunked,
        report.warnings.len()
    );
}
