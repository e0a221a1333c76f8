//! Text generation capability.
//!
//! [`Generator`] turns a prompt into text. Providers:
//! - **[`DisabledGenerator`]**: always fails with `GenerationUnavailable`.
//! - **[`OpenAIGenerator`]**: `/chat/completions` (OpenAI or compatible gateway).
//! - **[`OllamaGenerator`]**: `/api/generate` with streaming off.
//! - **[`GeminiGenerator`]**: `models/{model}:generateContent`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::embedding::qualify_gemini_model;
use crate::error::{Error, Result};
use crate::remote::{self, RemoteFailure, RetryPolicy};

const CAPABILITY: &str = "generation";

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

fn unavailable(err: RemoteFailure) -> Error {
    err.into_error(CAPABILITY, Error::GenerationUnavailable)
}

fn non_empty(text: Option<String>, provider: &str) -> Result<String> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(Error::GenerationUnavailable(format!(
            "{} returned an empty completion",
            provider
        ))),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::GenerationUnavailable(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: remote::api_key("OPENAI_API_KEY")?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: required_model(config)?,
            temperature: config.temperature,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

fn required_model(config: &GenerationConfig) -> anyhow::Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("generation.model required for {}", config.provider))
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let json = remote::send_json("OpenAI", self.policy, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(unavailable)?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string);
        non_empty(text, "OpenAI")
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: required_model(config)?,
            temperature: config.temperature,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let json = remote::send_json("Ollama", self.policy, || {
            self.client.post(&endpoint).json(&body)
        })
        .await
        .map_err(unavailable)?;

        let text = json
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string);
        non_empty(text, "Ollama")
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    policy: RetryPolicy,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: remote::api_key("GOOGLE_API_KEY")?,
            url: config.url.clone().unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            model: qualify_gemini_model(&required_model(config)?),
            temperature: config.temperature,
            policy: RetryPolicy::new(config.max_retries, config.timeout_secs),
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!(
            "{}/{}:generateContent",
            self.url.trim_end_matches('/'),
            self.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        let json = remote::send_json("Gemini", self.policy, || {
            self.client
                .post(&endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await
        .map_err(unavailable)?;

        non_empty(parse_gemini_response(&json), "Gemini")
    }
}

pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}
