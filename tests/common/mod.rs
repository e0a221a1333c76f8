//! Shared fixtures for the integration tests.
//!
//! Providers are replaced with deterministic in-process fakes; the
//! extractor and everything downstream of it are the real implementations.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lexrag::config::{ChunkingConfig, Config};
use lexrag::embedding::Embedder;
use lexrag::extract::{DocumentExtractor, TextExtractor};
use lexrag::generation::Generator;
use lexrag::models::UploadedFile;
use lexrag::service::{Capabilities, ServiceContext};
use lexrag::web_search::WebSearch;
use lexrag::Result;
use lexrag_core::index::FlatIndex;

pub const VOCABULARY: [&str; 3] = ["contract", "theft", "wages"];

/// Counts vocabulary words, plus a small constant so no vector is zero.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> Option<usize> {
        Some(VOCABULARY.len() + 1)
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Echoes prompts back. With `corpus_reply` set, prompts built from the
/// local corpus get that reply instead.
pub struct FakeGenerator {
    pub corpus_reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn echo() -> Self {
        Self {
            corpus_reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(corpus_reply: &str) -> Self {
        Self {
            corpus_reply: Some(corpus_reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    fn model_name(&self) -> &str {
        "fake"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.corpus_reply {
            Some(reply) if prompt.contains("Context:\n") => Ok(reply.clone()),
            _ => Ok(prompt.to_string()),
        }
    }
}

/// Returns a fixed search result and counts how often it was asked.
pub struct FakeWebSearch {
    pub result: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeWebSearch {
    pub fn returning(result: Option<&str>) -> Self {
        Self {
            result: result.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for FakeWebSearch {
    fn provider_name(&self) -> &str {
        "fake"
    }
    async fn search(&self, _query: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// Never finishes extracting.
pub struct StalledExtractor;

#[async_trait]
impl TextExtractor for StalledExtractor {
    async fn extract(&self, _bytes: Vec<u8>, _mime_type: &str) -> Result<String> {
        std::future::pending().await
    }
}

pub struct Fixture {
    pub generator: Arc<FakeGenerator>,
    pub web: Arc<FakeWebSearch>,
}

impl Fixture {
    pub fn new(generator: FakeGenerator, web: FakeWebSearch) -> Self {
        Self {
            generator: Arc::new(generator),
            web: Arc::new(web),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            embedder: Arc::new(KeywordEmbedder),
            generator: self.generator.clone(),
            web_search: self.web.clone(),
            extractor: Arc::new(DocumentExtractor),
        }
    }
}

/// 40-character windows with no overlap and a single retrieved chunk.
pub fn test_config(index_dir: &Path) -> Config {
    let mut config = Config::with_index_path(index_dir);
    config.chunking = ChunkingConfig {
        size: 40,
        overlap: 0,
    };
    config.retrieval.top_k = 1;
    config
}

pub fn service(index_dir: &Path, fixture: &Fixture) -> ServiceContext {
    ServiceContext::new(test_config(index_dir), fixture.capabilities(), FlatIndex::new())
}

fn segment(text: &str) -> String {
    format!("{:<40}", text)
}

/// Three 40-character segments; each becomes exactly one chunk.
pub fn three_topic_document() -> String {
    [
        segment("contract law covers offer and acceptance"),
        segment("theft is punishable under section 379"),
        segment("wages must be paid by the seventh day"),
    ]
    .concat()
}

pub fn text_upload(filename: &str, text: &str) -> UploadedFile {
    UploadedFile {
        filename: filename.to_string(),
        bytes: text.as_bytes().to_vec(),
        mime_type: "text/plain".to_string(),
    }
}
