//! Data types owned by the embedding index.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A bounded slice of source document text stored as a retrieval unit.
///
/// Chunks are created during ingestion, never mutated, and only removed by
/// a full index rebuild. `source_offset` is measured in characters of the
/// extracted document text the chunk was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u64,
    pub text: String,
    pub source_offset: Range<usize>,
}

/// A chunk produced by the chunker that has not been assigned an id yet.
///
/// The index assigns ids on [`add`](crate::index::VectorIndex::add) so that
/// ids stay unique across ingestion batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChunk {
    pub text: String,
    pub source_offset: Range<usize>,
}

/// One search hit: the stored chunk and its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
