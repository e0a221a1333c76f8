//! Brute-force [`VectorIndex`] implementation.
//!
//! Stores `(Chunk, Vector)` pairs in insertion order and scans all of them
//! on every query. Cheap to clone, which the application relies on for
//! copy-on-write updates.

use std::collections::HashSet;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, PendingChunk, ScoredChunk};

use super::VectorIndex;

/// A stored chunk and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Flat (exhaustive scan) embedding index.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
    dims: Option<usize>,
    next_id: u64,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from previously stored parts.
    ///
    /// Used when loading persisted state. Validates that ids are unique and
    /// below `next_id`, and that every vector matches `dims`.
    pub fn from_parts(entries: Vec<IndexEntry>, dims: Option<usize>, next_id: u64) -> Result<Self> {
        let dims = match (dims, entries.first()) {
            (Some(d), _) => Some(d),
            (None, Some(first)) => Some(first.vector.len()),
            (None, None) => None,
        };

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.chunk.id) {
                return Err(Error::DuplicateChunkId(entry.chunk.id));
            }
            if entry.chunk.id >= next_id {
                return Err(Error::InvalidParameter(format!(
                    "chunk id {} is not below next id {}",
                    entry.chunk.id, next_id
                )));
            }
            if let Some(expected) = dims {
                if entry.vector.len() != expected {
                    return Err(Error::DimensionMismatch {
                        expected,
                        actual: entry.vector.len(),
                    });
                }
            }
        }

        Ok(Self {
            entries,
            dims,
            next_id,
        })
    }

    /// Stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The id the next added chunk will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    fn check_vector(&self, expected: Option<usize>, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvalidParameter("vector must not be empty".to_string()));
        }
        if let Some(expected) = expected {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidParameter(
                "vector contains a non-finite value".to_string(),
            ));
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, chunks: Vec<PendingChunk>, vectors: Vec<Vec<f32>>) -> Result<Vec<u64>> {
        if chunks.len() != vectors.len() {
            return Err(Error::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        // Validate the whole batch before touching any state.
        let dims = self.dims.or_else(|| vectors.first().map(Vec::len));
        for v in &vectors {
            self.check_vector(dims, v)?;
        }

        let mut ids = Vec::with_capacity(chunks.len());
        for (pending, vector) in chunks.into_iter().zip(vectors) {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.push(IndexEntry {
                chunk: Chunk {
                    id,
                    text: pending.text,
                    source_offset: pending.source_offset,
                },
                vector,
            });
            ids.push(id);
        }
        if !ids.is_empty() {
            self.dims = dims;
        }

        Ok(ids)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if let Some(expected) = self.dims {
            if query.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query, &e.vector), e))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then(a.chunk.id.cmp(&b.chunk.id)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, e)| ScoredChunk {
                chunk: e.chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }
}
