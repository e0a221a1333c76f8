//! Embedding capability.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: OpenAI (or compatible) `/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`GeminiEmbedder`]**: Google's `batchEmbedContents` endpoint.
//! - **`LocalEmbedder`**: fastembed, behind the `local-embeddings-fastembed`
//!   feature; no network calls after the model download.
//!
//! Remote providers share the retry and timeout behaviour of
//! [`crate::remote`].
//!
//! # Provider Selection
//!
//! ```rust
//! # use lexrag::config::EmbeddingConfig;
//! # use lexrag::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::remote::{self, RemoteFailure, RetryPolicy};

const CAPABILITY: &str = "embedding";

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Expected dimensionality, when known up front.
    fn dims(&self) -> Option<usize>;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("provider returned no vector".into()))
    }
}

/// Check a provider response against the request it answers.
fn check_batch(vectors: Vec<Vec<f32>>, expected: usize, dims: Option<usize>) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(Error::EmbeddingUnavailable(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    if let Some(dims) = dims {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }
    }
    Ok(vectors)
}

fn unavailable(err: RemoteFailure) -> Error {
    err.into_error(CAPABILITY, Error::EmbeddingUnavailable)
}

fn parse_vector(value: &Value, what: &str) -> Result<Vec<f32>> {
    let array = value
        .as_array()
        .ok_or_else(|| Error::EmbeddingUnavailable(format!("invalid response: missing {}", what)))?;
    array
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::EmbeddingUnavailable(format!("invalid response: non-numeric value in {}", what))
            })
        })
        .collect()
}

// ============ Disabled ============

/// Placeholder used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingUnavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dims: Option<usize>,
    policy: RetryPolicy,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = remote::api_key("OPENAI_API_KEY")?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            dims: config.dims,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = format!("{}/embeddings", self.url.trim_end_matches('/'));
        let body = json!({ "model": self.model, "input": texts });

        let json = remote::send_json("OpenAI", self.policy, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(unavailable)?;

        check_batch(parse_openai_response(&json)?, texts.len(), self.dims)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::EmbeddingUnavailable("invalid response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let vector = parse_vector(item.get("embedding").unwrap_or(&Value::Null), "embedding")?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Calls `POST /api/embed` on the configured Ollama URL
/// (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
    policy: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for ollama"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model,
            dims: config.dims,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let body = json!({ "model": self.model, "input": texts });

        let json = remote::send_json("Ollama", self.policy, || {
            self.client.post(&endpoint).json(&body)
        })
        .await
        .map_err(unavailable)?;

        let vectors = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingUnavailable("invalid Ollama response: missing embeddings".into())
            })?
            .iter()
            .map(|v| parse_vector(v, "embedding"))
            .collect::<Result<Vec<_>>>()?;
        check_batch(vectors, texts.len(), self.dims)
    }
}

// ============ Gemini ============

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Calls `models/{model}:batchEmbedContents`. Reads `GOOGLE_API_KEY`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    url: String,
    /// Fully qualified, e.g. `models/embedding-001`.
    model: String,
    dims: Option<usize>,
    policy: RetryPolicy,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = remote::api_key("GOOGLE_API_KEY")?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for gemini"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: config.url.clone().unwrap_or_else(|| GEMINI_API.to_string()),
            model: qualify_gemini_model(&model),
            dims: config.dims,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

pub(crate) fn qualify_gemini_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = format!(
            "{}/{}:batchEmbedContents",
            self.url.trim_end_matches('/'),
            self.model
        );
        let requests: Vec<Value> = texts
            .iter()
            .map(|t| json!({ "model": self.model, "content": { "parts": [{ "text": t }] } }))
            .collect();
        let body = json!({ "requests": requests });

        let json = remote::send_json("Gemini", self.policy, || {
            self.client
                .post(&endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await
        .map_err(unavailable)?;

        let vectors = json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingUnavailable("invalid Gemini response: missing embeddings".into())
            })?
            .iter()
            .map(|e| parse_vector(e.get("values").unwrap_or(&Value::Null), "values"))
            .collect::<Result<Vec<_>>>()?;
        check_batch(vectors, texts.len(), self.dims)
    }
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    batch_size: usize,
    dims: Option<usize>,
    timeout: std::time::Duration,
    loaded: Arc<parking_lot::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let model = fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            model,
            batch_size: config.batch_size,
            dims: config.dims,
            timeout: std::time::Duration::from_secs(config.timeout_secs),
            loaded: Arc::new(parking_lot::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> anyhow::Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        other => anyhow::bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let owned = texts.to_vec();

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = loaded.lock();
            if guard.is_none() {
                let embedding = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(false),
                )
                .map_err(|e| {
                    Error::EmbeddingUnavailable(format!("failed to load local model: {}", e))
                })?;
                *guard = Some(embedding);
            }
            let Some(embedding) = guard.as_mut() else {
                return Err(Error::EmbeddingUnavailable("local model not loaded".into()));
            };
            embedding
                .embed(owned, Some(batch_size))
                .map_err(|e| Error::EmbeddingUnavailable(format!("local embedding failed: {}", e)))
        });
        let vectors = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| Error::ExternalTimeout {
                capability: CAPABILITY,
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {}", e)))??;

        check_batch(vectors, texts.len(), self.dims)
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"gemini"` | [`GeminiEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires `local-embeddings-fastembed`) |
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => anyhow::bail!(
            "embedding provider 'local' requires the local-embeddings-fastembed feature"
        ),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}
