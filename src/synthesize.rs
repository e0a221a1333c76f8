//! Prompt assembly on top of the [`Generator`] capability.
//!
//! Three modes: answer from retrieved corpus chunks, answer from web search
//! content, and summarise an uploaded legal document. Caller metadata in
//! [`QueryContext`] is interpolated into the prompt and never inspected.
//! Answers are requested as HTML fragments.

use std::fmt::Write;
use std::sync::Arc;

use lexrag_core::models::ScoredChunk;

use crate::error::Result;
use crate::generation::Generator;
use crate::models::QueryContext;

const FORMAT_RULES: &str = "\
Format the answer as a well-structured HTML fragment using headings, paragraphs, \
lists and tables where they help. Do not emit <html>, <head> or <body> tags, \
Markdown, or code fences. End with the sources or citations you relied on.";

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    analysis_max_chars: usize,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, analysis_max_chars: usize) -> Self {
        Self {
            generator,
            analysis_max_chars,
        }
    }

    /// Answer `question` from retrieved corpus chunks.
    pub async fn from_corpus(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        ctx: &QueryContext,
    ) -> Result<String> {
        let mut context = String::new();
        for hit in chunks {
            let _ = writeln!(context, "{}\n", hit.chunk.text);
        }
        let prompt = format!(
            "You are a reliable legal assistant specialised in Indian law (IPC, RTI, labour law and related regulations).\n\
             {caller}\n\
             Use the context below to give a detailed, accurate and clear answer. Quote legal \
             references from the context precisely. If the context is insufficient, reply \
             \"I am unable to provide a legally accurate answer based on the available context.\"\n\n\
             Context:\n{context}\n\
             Question:\n{question}\n\n\
             {rules}\n\
             Answer (in {language}):",
            caller = caller_block(ctx),
            context = context,
            question = question,
            rules = FORMAT_RULES,
            language = ctx.language,
        );
        self.run(&prompt).await
    }

    /// Answer `question` from text returned by web search.
    pub async fn from_web(&self, question: &str, web_text: &str, ctx: &QueryContext) -> Result<String> {
        let prompt = format!(
            "You are a legal assistant specialised in Indian law (IPC, RTI, labour law and related regulations).\n\
             {caller}\n\
             Use the web search results below to give a detailed, legally accurate and \
             easy-to-understand answer. Base the answer on the results, cite specific sections \
             where they apply, and do not invent laws.\n\n\
             Web data:\n{web}\n\n\
             Question:\n{question}\n\n\
             {rules}\n\
             Answer (in {language}):",
            caller = caller_block(ctx),
            web = web_text,
            question = question,
            rules = FORMAT_RULES,
            language = ctx.language,
        );
        self.run(&prompt).await
    }

    /// Summarise the legal content of an uploaded document.
    ///
    /// Text beyond `analysis_max_chars` characters is dropped.
    pub async fn analyze_document(&self, document_text: &str, ctx: &QueryContext) -> Result<String> {
        let document = truncate_chars(document_text, self.analysis_max_chars);
        let prompt = format!(
            "You are a legal assistant. The text below comes from a legal document.\n\
             Identify the parties, dates and legal terminology it mentions, point out the \
             important clauses and provisions (terms, liabilities, rights), and summarise its \
             key legal aspects in simple terms.\n\n\
             Document:\n{document}\n\n\
             {rules}\n\
             Answer (in {language}):",
            document = document,
            rules = FORMAT_RULES,
            language = ctx.language,
        );
        self.run(&prompt).await
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        let raw = self.generator.generate(prompt).await?;
        Ok(strip_code_fence(&raw).to_string())
    }
}

fn caller_block(ctx: &QueryContext) -> String {
    let previous = match &ctx.prior_question {
        Some(q) => format!("Previous question: {}", q),
        None => "No previous question available.".to_string(),
    };
    format!(
        "User type: {}\nLegal area: {}\nPreferred language: {}\n{}",
        ctx.user_type, ctx.legal_area, ctx.language, previous
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Remove a surrounding ```` ```html ```` fence that models add despite instructions.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
