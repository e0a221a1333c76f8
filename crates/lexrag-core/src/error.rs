use thiserror::Error;

/// Errors raised by the chunker and the embedding index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("vector dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("index is empty")]
    EmptyIndex,

    #[error("duplicate chunk id: {0}")]
    DuplicateChunkId(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
