//! Web search capability used when the local corpus cannot answer.
//!
//! [`WebSearch::search`] returns `Ok(None)` when the provider answered but
//! produced nothing usable; the escalation controller turns that into
//! `NoFallbackData`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::WebSearchConfig;
use crate::error::{Error, Result};
use crate::remote::{self, RetryPolicy};

const CAPABILITY: &str = "web_search";
const TAVILY_URL: &str = "https://api.tavily.com/search";

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Search the web for `query`, returning concatenated page content.
    async fn search(&self, query: &str) -> Result<Option<String>>;
}

pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    fn provider_name(&self) -> &str {
        "disabled"
    }
    async fn search(&self, _query: &str) -> Result<Option<String>> {
        Err(Error::WebSearchUnavailable(
            "web search provider is disabled".to_string(),
        ))
    }
}

/// Tavily search API. Reads `TAVILY_API_KEY`.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    url: String,
    max_results: usize,
    search_depth: String,
    policy: RetryPolicy,
}

impl TavilySearch {
    pub fn new(config: &WebSearchConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: remote::api_key("TAVILY_API_KEY")?,
            url: TAVILY_URL.to_string(),
            max_results: config.max_results,
            search_depth: config.search_depth.clone(),
            policy: RetryPolicy::new(0, config.timeout_secs),
        })
    }
}

/// Join the non-blank `results[].content` strings.
fn collect_content(json: &Value) -> Option<String> {
    let results = json.get("results")?.as_array()?;
    let pieces: Vec<&str> = results
        .iter()
        .filter_map(|r| r.get("content").and_then(Value::as_str))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join("\n\n"))
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn provider_name(&self) -> &str {
        "tavily"
    }
    async fn search(&self, query: &str) -> Result<Option<String>> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": self.search_depth,
            "max_results": self.max_results,
            "include_answer": false,
        });

        let json = remote::send_json("Tavily", self.policy, || {
            self.client.post(&self.url).json(&body)
        })
        .await
        .map_err(|e| e.into_error(CAPABILITY, Error::WebSearchUnavailable))?;

        Ok(collect_content(&json))
    }
}

pub fn create_web_search(config: &WebSearchConfig) -> anyhow::Result<Arc<dyn WebSearch>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledWebSearch)),
        "tavily" => Ok(Arc::new(TavilySearch::new(config)?)),
        other => anyhow::bail!("Unknown web_search provider: {}", other),
    }
}
