//! Error taxonomy for the service.
//!
//! Each variant carries a stable machine-readable [`code`](Error::code) and
//! an HTTP [`status`](Error::status). Decode and validation failures map to
//! 4xx; external-capability failures map to 5xx with the kind preserved.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },

    #[error("index is empty")]
    EmptyIndex,

    #[error("no corpus available: the index holds no documents")]
    NoCorpusAvailable,

    #[error("index not found at {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("embedding capability unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("generation capability unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("web search unavailable: {0}")]
    WebSearchUnavailable(String),

    #[error("web search returned no usable content")]
    NoFallbackData,

    #[error("{capability} call timed out after {secs}s")]
    ExternalTimeout { capability: &'static str, secs: u64 },

    #[error("multipart content type has no boundary")]
    MissingBoundary,

    #[error("malformed multipart part: {0}")]
    MalformedPart(String),

    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("question must not be empty")]
    MissingQuestion,

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Snake-case kind name included in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidParameter(_) => "invalid_parameter",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::LengthMismatch { .. } => "length_mismatch",
            Error::EmptyIndex => "empty_index",
            Error::NoCorpusAvailable => "no_corpus_available",
            Error::IndexNotFound(_) => "index_not_found",
            Error::IndexCorrupt(_) => "index_corrupt",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::GenerationUnavailable(_) => "generation_unavailable",
            Error::WebSearchUnavailable(_) => "web_search_unavailable",
            Error::NoFallbackData => "no_fallback_data",
            Error::ExternalTimeout { .. } => "external_timeout",
            Error::MissingBoundary => "missing_boundary",
            Error::MalformedPart(_) => "malformed_part",
            Error::InvalidJson(_) => "invalid_json",
            Error::MissingQuestion => "missing_question",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::ExtractionFailed(_) => "extraction_failed",
            Error::Io(_) => "io",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingBoundary
            | Error::MalformedPart(_)
            | Error::InvalidJson(_)
            | Error::MissingQuestion
            | Error::InvalidParameter(_)
            | Error::ExtractionFailed(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::NoCorpusAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::ExternalTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::EmbeddingUnavailable(_)
            | Error::GenerationUnavailable(_)
            | Error::WebSearchUnavailable(_)
            | Error::NoFallbackData => StatusCode::BAD_GATEWAY,
            Error::DimensionMismatch { .. }
            | Error::LengthMismatch { .. }
            | Error::EmptyIndex
            | Error::IndexNotFound(_)
            | Error::IndexCorrupt(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<lexrag_core::Error> for Error {
    fn from(err: lexrag_core::Error) -> Self {
        use lexrag_core::Error as Core;
        match err {
            Core::InvalidParameter(msg) => Error::InvalidParameter(msg),
            Core::DimensionMismatch { expected, actual } => {
                Error::DimensionMismatch { expected, actual }
            }
            Core::LengthMismatch { chunks, vectors } => Error::LengthMismatch { chunks, vectors },
            Core::EmptyIndex => Error::EmptyIndex,
            Core::DuplicateChunkId(id) => {
                Error::IndexCorrupt(format!("duplicate chunk id {}", id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_client_errors() {
        for err in [
            Error::MissingBoundary,
            Error::MalformedPart("x".into()),
            Error::InvalidJson("x".into()),
            Error::MissingQuestion,
            Error::UnsupportedFormat("image/png".into()),
        ] {
            assert!(err.status().is_client_error(), "{}", err.code());
        }
    }

    #[test]
    fn test_capability_errors_are_server_errors() {
        for err in [
            Error::GenerationUnavailable("down".into()),
            Error::NoFallbackData,
            Error::ExternalTimeout {
                capability: "generation",
                secs: 5,
            },
            Error::IndexCorrupt("bad".into()),
        ] {
            assert!(err.status().is_server_error(), "{}", err.code());
        }
    }

    #[test]
    fn test_core_errors_map_one_to_one() {
        let err: Error = lexrag_core::Error::EmptyIndex.into();
        assert!(matches!(err, Error::EmptyIndex));
        let err: Error = lexrag_core::Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(err.code(), "dimension_mismatch");
    }
}
