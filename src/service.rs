//! The ingestion/query service shared by the HTTP server and the CLI.
//!
//! [`ServiceContext::handle`] routes one request:
//! - upload present → ingest it; a blank question then yields a document analysis
//! - no upload and a blank question → `MissingQuestion`
//! - otherwise → retrieve, synthesise, and escalate when the local answer is weak

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lexrag_core::index::{FlatIndex, VectorIndex};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::escalation::{EscalationController, EscalationPolicy};
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::generation::{create_generator, Generator};
use crate::ingest::{CorpusReport, IngestReport, Ingestor};
use crate::models::{AnswerResult, QueryRequest, SourceKind, UploadedFile};
use crate::retrieve::Retriever;
use crate::store::{IndexStore, SharedIndex};
use crate::synthesize::Synthesizer;
use crate::web_search::{create_web_search, WebSearch};

/// The external capabilities the service depends on.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub web_search: Arc<dyn WebSearch>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl Capabilities {
    /// Providers named in the configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
            web_search: create_web_search(&config.web_search)?,
            extractor: Arc::new(DocumentExtractor),
        })
    }
}

/// Everything a request needs; cheap to share across tasks.
pub struct ServiceContext {
    config: Config,
    index: Arc<SharedIndex>,
    ingestor: Ingestor,
    synthesizer: Arc<Synthesizer>,
    controller: EscalationController,
}

impl ServiceContext {
    /// Wire the pipeline around an already-loaded index.
    pub fn new(config: Config, caps: Capabilities, index: FlatIndex) -> Self {
        let store = IndexStore::new(&config.index.path);
        let index = Arc::new(SharedIndex::new(index, store));

        let synthesizer = Arc::new(Synthesizer::new(
            Arc::clone(&caps.generator),
            config.generation.analysis_max_chars,
        ));
        let retriever = Retriever::new(Arc::clone(&caps.embedder), Arc::clone(&index));
        let controller = EscalationController::new(
            retriever,
            Arc::clone(&synthesizer),
            Arc::clone(&caps.web_search),
            EscalationPolicy::from_config(&config.escalation),
            config.retrieval.top_k,
            config.escalation.escalate_on_empty_corpus,
        );
        let ingestor = Ingestor::new(
            Arc::clone(&caps.extractor),
            Arc::clone(&caps.embedder),
            Arc::clone(&index),
            config.chunking.clone(),
            config.embedding.batch_size,
            Duration::from_secs(config.extraction.timeout_secs),
        );

        Self {
            config,
            index,
            ingestor,
            synthesizer,
            controller,
        }
    }

    /// Load (or bootstrap) the persisted index and build the service.
    ///
    /// - missing index → start empty, then ingest `corpus.dir` if set
    /// - corrupt index → fail, unless `index.rebuild_on_corrupt` is set
    /// - embedder dims differ from the index → `DimensionMismatch`
    pub async fn from_config(config: Config, caps: Capabilities) -> Result<Self> {
        let store = IndexStore::new(&config.index.path);
        let (index, bootstrap) = match store.load() {
            Ok(index) => (index, false),
            Err(Error::IndexNotFound(path)) => {
                info!(path = %path.display(), "no persisted index, starting empty");
                (FlatIndex::new(), true)
            }
            Err(Error::IndexCorrupt(reason)) if config.index.rebuild_on_corrupt => {
                warn!(%reason, "persisted index is corrupt, rebuilding");
                (FlatIndex::new(), true)
            }
            Err(e) => return Err(e),
        };
        check_dims(caps.embedder.as_ref(), &index)?;
        info!(
            embedder = caps.embedder.model_name(),
            web_search = caps.web_search.provider_name(),
            chunks = index.len(),
            "index loaded"
        );

        let ctx = Self::new(config, caps, index);
        if bootstrap {
            if let Some(dir) = ctx.config.corpus.dir.clone() {
                if dir.is_dir() {
                    ctx.ingestor.rebuild_from_dir(&dir).await?;
                } else {
                    warn!(dir = %dir.display(), "corpus directory not found, skipping bootstrap");
                }
            }
        }
        Ok(ctx)
    }

    /// Re-ingest `corpus.dir` into a fresh index without reading the
    /// persisted one, so a corrupt index can always be replaced.
    pub async fn rebuild_index(config: Config, caps: Capabilities) -> Result<CorpusReport> {
        Self::new(config, caps, FlatIndex::new()).rebuild().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    /// Number of chunks in the current index snapshot.
    pub fn chunk_count(&self) -> usize {
        self.index.snapshot().len()
    }

    /// Answer one request.
    pub async fn handle(&self, request: QueryRequest) -> Result<AnswerResult> {
        let ctx = request.context();
        let question = request.question.trim();

        if let Some(file) = &request.uploaded_file {
            let report = self.ingestor.ingest_file(file).await?;
            if question.is_empty() {
                info!(filename = %report.filename, "analysing uploaded document");
                let text = self.synthesizer.analyze_document(&report.text, &ctx).await?;
                return Ok(AnswerResult {
                    source_kind: SourceKind::DocumentAnalysis,
                    text,
                });
            }
        } else if question.is_empty() {
            return Err(Error::MissingQuestion);
        }

        self.controller.answer(question, &ctx).await
    }

    /// Ingest a single document outside of a query.
    pub async fn ingest(&self, file: &UploadedFile) -> Result<IngestReport> {
        self.ingestor.ingest_file(file).await
    }

    /// Add every supported file under `dir` to the current index.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<CorpusReport> {
        self.ingestor.ingest_dir(dir).await
    }

    /// Replace the index with a fresh ingestion of `corpus.dir`.
    pub async fn rebuild(&self) -> Result<CorpusReport> {
        let dir = self.config.corpus.dir.clone().ok_or_else(|| {
            Error::InvalidParameter("corpus.dir is not configured".to_string())
        })?;
        self.ingestor.rebuild_from_dir(&dir).await
    }
}

/// A persisted index built with a different model cannot be searched.
fn check_dims(embedder: &dyn Embedder, index: &FlatIndex) -> Result<()> {
    match (embedder.dims(), index.dims()) {
        (Some(expected), Some(actual)) if expected != actual => {
            Err(Error::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}
