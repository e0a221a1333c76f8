//! Embedding index abstraction.
//!
//! The [`VectorIndex`] trait is the only surface the retrieval and ingestion
//! paths depend on, so an approximate-search structure can replace the
//! brute-force [`FlatIndex`] without touching callers.
//!
//! # Invariants
//!
//! - Every stored vector has the same dimensionality, fixed by the first
//!   successful [`add`](VectorIndex::add).
//! - Chunk ids are unique, assigned by the index in insertion order, and
//!   never reused.
//! - Search results are ordered by descending cosine similarity, ties broken
//!   by ascending chunk id.

mod flat;

pub use flat::{FlatIndex, IndexEntry};

use crate::error::Result;
use crate::models::{PendingChunk, ScoredChunk};

/// Nearest-neighbour index over chunk embeddings.
pub trait VectorIndex: Send + Sync {
    /// Append chunks with their vectors, returning the ids assigned to them.
    ///
    /// All-or-nothing: on error the index is unchanged.
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if `chunks.len() != vectors.len()`.
    /// - `DimensionMismatch` if any vector's length differs from the
    ///   established dimensionality (or from the other vectors in the batch
    ///   when the index is still empty).
    /// - `InvalidParameter` for empty or non-finite vectors.
    fn add(&mut self, chunks: Vec<PendingChunk>, vectors: Vec<Vec<f32>>) -> Result<Vec<u64>>;

    /// Return up to `k` entries most similar to `query`.
    ///
    /// # Errors
    ///
    /// - `EmptyIndex` if the index holds no entries.
    /// - `DimensionMismatch` if `query` has the wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Established vector dimensionality, if any vector was ever added.
    fn dims(&self) -> Option<usize>;
}
