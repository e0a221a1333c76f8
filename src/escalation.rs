//! Confidence-based escalation from the local corpus to web search.
//!
//! The controller produces a local answer, evaluates it once with
//! [`EscalationPolicy::evaluate`], and on [`EscalationState::Escalated`]
//! answers from web search instead. The web answer is final: it is not
//! evaluated again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EscalationConfig;
use crate::error::{Error, Result};
use crate::models::{AnswerResult, QueryContext, SourceKind};
use crate::retrieve::Retriever;
use crate::synthesize::Synthesizer;
use crate::web_search::WebSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    LocalAnswer,
    Escalated,
}

/// Decides whether a local answer is good enough.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// Answers with fewer whitespace-separated words escalate.
    pub min_words: usize,
    /// Lowercase phrases whose presence marks an answer as uncertain.
    pub uncertainty_phrases: Vec<String>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::from_config(&EscalationConfig::default())
    }
}

impl EscalationPolicy {
    pub fn new(min_words: usize, uncertainty_phrases: &[String]) -> Self {
        Self {
            min_words,
            uncertainty_phrases: uncertainty_phrases
                .iter()
                .map(|p| normalize(p))
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &EscalationConfig) -> Self {
        Self::new(config.min_words, &config.uncertainty_phrases)
    }

    pub fn evaluate(&self, answer: &str) -> EscalationState {
        if answer.split_whitespace().count() < self.min_words {
            return EscalationState::Escalated;
        }
        let lowered = normalize(answer);
        if self
            .uncertainty_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
        {
            return EscalationState::Escalated;
        }
        EscalationState::LocalAnswer
    }
}

/// Lowercase and fold typographic apostrophes so `I don’t know` matches.
fn normalize(text: &str) -> String {
    text.to_lowercase().replace('\u{2019}', "'")
}

/// Runs the query path: retrieve, synthesise, evaluate, and escalate.
pub struct EscalationController {
    retriever: Retriever,
    synthesizer: Arc<Synthesizer>,
    web: Arc<dyn WebSearch>,
    policy: EscalationPolicy,
    top_k: usize,
    escalate_on_empty_corpus: bool,
}

impl EscalationController {
    pub fn new(
        retriever: Retriever,
        synthesizer: Arc<Synthesizer>,
        web: Arc<dyn WebSearch>,
        policy: EscalationPolicy,
        top_k: usize,
        escalate_on_empty_corpus: bool,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            web,
            policy,
            top_k,
            escalate_on_empty_corpus,
        }
    }

    pub async fn answer(&self, question: &str, ctx: &QueryContext) -> Result<AnswerResult> {
        let chunks = match self.retriever.retrieve(question, self.top_k).await {
            Ok(chunks) => chunks,
            Err(Error::NoCorpusAvailable) if self.escalate_on_empty_corpus => {
                info!("no local corpus, escalating to web search");
                return self.escalate(question, ctx).await;
            }
            Err(e) => return Err(e),
        };

        let local = self.synthesizer.from_corpus(question, &chunks, ctx).await?;
        match self.policy.evaluate(&local) {
            EscalationState::LocalAnswer => {
                debug!(words = local.split_whitespace().count(), "answered from corpus");
                Ok(AnswerResult {
                    source_kind: SourceKind::LocalCorpus,
                    text: local,
                })
            }
            EscalationState::Escalated => {
                info!(
                    words = local.split_whitespace().count(),
                    "local answer insufficient, escalating to web search"
                );
                self.escalate(question, ctx).await
            }
        }
    }

    async fn escalate(&self, question: &str, ctx: &QueryContext) -> Result<AnswerResult> {
        let provider = self.web.provider_name();
        let web_text = self
            .web
            .search(question)
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                warn!(provider, "web search returned nothing usable");
                Error::NoFallbackData
            })?;
        debug!(provider, chars = web_text.len(), "web search results");

        let text = self.synthesizer.from_web(question, &web_text, ctx).await?;
        Ok(AnswerResult {
            source_kind: SourceKind::WebFallback,
            text,
        })
    }
}
