//! Request and response types that flow through the query pipeline.
//!
//! These are transient: built per HTTP request (or CLI invocation) and never
//! persisted. Chunk and index types live in [`lexrag_core::models`].

use serde::{Deserialize, Serialize};

/// Default `user_type` when the request omits it.
pub const DEFAULT_USER_TYPE: &str = "user";
/// Default `legal_area` when the request omits it.
pub const DEFAULT_LEGAL_AREA: &str = "General Law";
/// Default `selected_language` when the request omits it.
pub const DEFAULT_LANGUAGE: &str = "English";

/// A decoded, validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub question: String,
    /// Caller category label, forwarded verbatim to generation.
    pub user_type: String,
    pub legal_area: String,
    pub language: String,
    pub prior_question: Option<String>,
    pub uploaded_file: Option<UploadedFile>,
}

impl QueryRequest {
    /// A request for `question` with every optional field at its default.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            user_type: DEFAULT_USER_TYPE.to_string(),
            legal_area: DEFAULT_LEGAL_AREA.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            prior_question: None,
            uploaded_file: None,
        }
    }

    pub fn user_category(&self) -> UserType {
        UserType::from_label(&self.user_type)
    }

    /// The opaque metadata handed to the synthesizer.
    pub fn context(&self) -> QueryContext {
        QueryContext {
            user_type: self.user_type.clone(),
            legal_area: self.legal_area.clone(),
            language: self.language.clone(),
            prior_question: self.prior_question.clone(),
        }
    }
}

/// A document uploaded alongside a request.
#[derive(Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Coarse caller category derived from the free-form `user_type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    General,
    Professional,
}

impl UserType {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "advocate" | "judge" | "lawyer" | "professional" => UserType::Professional,
            _ => UserType::General,
        }
    }
}

/// Caller metadata forwarded verbatim into generation prompts.
///
/// The synthesizer never branches on these values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryContext {
    pub user_type: String,
    pub legal_area: String,
    pub language: String,
    pub prior_question: Option<String>,
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "Dataset")]
    LocalCorpus,
    #[serde(rename = "Internet")]
    WebFallback,
    #[serde(rename = "AI Analysis")]
    DocumentAnalysis,
}

/// The response body: `{"source": "Dataset", "ai_answer": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    #[serde(rename = "source")]
    pub source_kind: SourceKind,
    #[serde(rename = "ai_answer")]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_result_wire_shape() {
        let json = serde_json::to_value(AnswerResult {
            source_kind: SourceKind::WebFallback,
            text: "<p>answer</p>".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "source": "Internet", "ai_answer": "<p>answer</p>" })
        );
    }

    #[test]
    fn test_source_kind_labels() {
        let label = |k| serde_json::to_string(&k).unwrap();
        assert_eq!(label(SourceKind::LocalCorpus), "\"Dataset\"");
        assert_eq!(label(SourceKind::DocumentAnalysis), "\"AI Analysis\"");
    }

    #[test]
    fn test_user_category() {
        assert_eq!(UserType::from_label("user"), UserType::General);
        assert_eq!(UserType::from_label("Advocate"), UserType::Professional);
        assert_eq!(UserType::from_label(" judge "), UserType::Professional);
        assert_eq!(UserType::from_label(""), UserType::General);
    }

    #[test]
    fn test_new_request_defaults() {
        let req = QueryRequest::new("What is FIR?");
        assert_eq!(req.user_type, "user");
        assert_eq!(req.legal_area, "General Law");
        assert_eq!(req.language, "English");
        assert!(req.prior_question.is_none());
        assert_eq!(req.user_category(), UserType::General);
    }
}
