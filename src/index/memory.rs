use super::{chunk_id, document_text, Indexer, ScoredChunk};
use crate::config::ChunkerConfig;
use crate::parser::Chunk;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

struct Entry {
    chunk: Chunk,
    terms: BTreeSet<String>,
}

/// In-process index ranking chunks by identifier overlap
pub struct MemoryIndex {
    batch_size: usize,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryIndex {
    pub fn new(config: &ChunkerConfig) -> Self {
        Self {
            batch_size: config.index_batch_size.max(1),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new(&ChunkerConfig::default())
    }
}

#[async_trait::async_trait]
impl Indexer for MemoryIndex {
    async fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let valid: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| !c.source_text.trim().is_empty())
            .collect();
        let batches = (valid.len() + self.batch_size - 1) / self.batch_size;
        tracing::debug!("Indexing {} of {} chunks in {} batches", valid.len(), chunks.len(), batches);

        for (i, batch) in valid.chunks(self.batch_size).enumerate() {
            let mut entries = self.entries.write().await;
            for chunk in batch {
                let entry = Entry {
                    terms: terms(&document_text(chunk)),
                    chunk: (*chunk).clone(),
                };
                entries.insert(chunk_id(chunk), entry);
            }
            tracing::trace!("Indexed batch {}/{}", i + 1, batches);
        }

        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let query = terms(text);
        let entries = self.entries.read().await;

        let mut scored: Vec<(&String, f32, &Entry)> = entries
            .iter()
            .map(|(id, entry)| (id, distance(&query, &entry.terms), entry))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, distance, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                distance,
            })
            .collect())
    }
}

/// Lowercase identifier-like words
fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard distance; disjoint or empty sets are maximally distant
fn distance(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    1.0 - shared as f32 / union as f32
}
