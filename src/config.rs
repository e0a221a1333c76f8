//! TOML configuration.
//!
//! Every section except `[index]` is optional and falls back to the
//! defaults documented on each field. API keys are never read from this
//! file; providers pick them up from the environment.
//!
//! ```toml
//! [index]
//! path = "./data/index"
//!
//! [chunking]
//! size = 2000
//! overlap = 100
//!
//! [embedding]
//! provider = "gemini"
//! model = "models/embedding-001"
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-2.0-flash"
//!
//! [web_search]
//! provider = "tavily"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl Config {
    /// A configuration with every section at its default, persisting the
    /// index under `index_path`. Used by tests and by tooling that has no
    /// config file.
    pub fn with_index_path(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index: IndexConfig {
                path: index_path.into(),
                rebuild_on_corrupt: false,
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            escalation: EscalationConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            web_search: WebSearchConfig::default(),
            extraction: ExtractionConfig::default(),
            server: ServerConfig::default(),
            corpus: CorpusConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted index.
    pub path: PathBuf,
    /// Start with an empty index (and re-ingest `corpus.dir`) instead of
    /// refusing to start when the persisted index is corrupt.
    #[serde(default)]
    pub rebuild_on_corrupt: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window length in characters.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    /// Characters shared by consecutive windows.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EscalationConfig {
    /// Local answers with fewer words than this are escalated.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    /// Case-insensitive phrases that mark a local answer as uncertain.
    #[serde(default = "default_uncertainty_phrases")]
    pub uncertainty_phrases: Vec<String>,
    /// Treat an empty corpus as an insufficient local answer.
    #[serde(default = "default_true")]
    pub escalate_on_empty_corpus: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            uncertainty_phrases: default_uncertainty_phrases(),
            escalate_on_empty_corpus: true,
        }
    }
}

fn default_min_words() -> usize {
    30
}
fn default_uncertainty_phrases() -> Vec<String> {
    vec!["i don't know".to_string()]
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, OpenAI-compatible gateways).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after a timed-out call. Other failures are never retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    0
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Extra attempts after a timed-out call. Other failures are never retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Document text beyond this many characters is cut before analysis.
    #[serde(default = "default_analysis_max_chars")]
    pub analysis_max_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
            analysis_max_chars: default_analysis_max_chars(),
        }
    }
}

fn default_temperature() -> f32 {
    0.3
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_analysis_max_chars() -> usize {
    30_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            max_results: default_max_results(),
            search_depth: default_search_depth(),
            timeout_secs: default_web_timeout(),
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_search_depth() -> String {
    "basic".to_string()
}
fn default_web_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Upper bound on extracting text from one document.
    #[serde(default = "default_extraction_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout(),
        }
    }
}

fn default_extraction_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path of the single query/upload endpoint.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            path: default_path(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_path() -> String {
    "/query".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorpusConfig {
    /// Directory of PDF, DOCX, and TXT files ingested when no persisted
    /// index exists, and on `lexrag rebuild`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    for (name, secs) in [
        ("embedding.timeout_secs", config.embedding.timeout_secs),
        ("generation.timeout_secs", config.generation.timeout_secs),
        ("web_search.timeout_secs", config.web_search.timeout_secs),
        ("extraction.timeout_secs", config.extraction.timeout_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} must be >= 1", name);
        }
    }

    if !config.server.path.starts_with('/') {
        anyhow::bail!("server.path must start with '/': '{}'", config.server.path);
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "gemini" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, gemini, or local.",
            other
        ),
    }
    if matches!(
        config.embedding.provider.as_str(),
        "openai" | "ollama" | "gemini"
    ) && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" | "ollama" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, ollama, or gemini.",
            other
        ),
    }
    if config.generation.provider != "disabled" && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    match config.web_search.provider.as_str() {
        "disabled" | "tavily" => {}
        other => anyhow::bail!(
            "Unknown web_search provider: '{}'. Must be disabled or tavily.",
            other
        ),
    }

    Ok(())
}
