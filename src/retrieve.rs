//! Question → nearest chunks.

use std::sync::Arc;

use lexrag_core::index::VectorIndex;
use lexrag_core::models::ScoredChunk;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::store::SharedIndex;

/// Embeds a question and searches the current index snapshot.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<SharedIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<SharedIndex>) -> Self {
        Self { embedder, index }
    }

    /// Return up to `k` chunks most similar to `question`.
    ///
    /// An empty index yields `NoCorpusAvailable` without calling the
    /// embedder.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            return Err(Error::NoCorpusAvailable);
        }

        let query = self.embedder.embed_query(question).await?;
        let hits = snapshot.search(&query, k).map_err(|e| match e {
            lexrag_core::Error::EmptyIndex => Error::NoCorpusAvailable,
            other => other.into(),
        })?;
        debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok(hits)
    }
}
