//! Ingestion pipeline: extract → chunk → embed → add + save.
//!
//! Each document is one batch. Its chunks are embedded in groups of
//! `embedding.batch_size` and added to the shared index in a single
//! all-or-nothing step, so a failure halfway through a document leaves the
//! index and its persisted copy unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lexrag_core::chunk::chunk_spans;
use lexrag_core::index::{FlatIndex, VectorIndex};
use lexrag_core::models::PendingChunk;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::extract::{mime_from_filename, TextExtractor};
use crate::models::UploadedFile;
use crate::store::SharedIndex;

/// Outcome of ingesting one document.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub filename: String,
    pub chunk_ids: Vec<u64>,
    /// The extracted text, kept for document analysis.
    pub text: String,
}

/// Outcome of ingesting a corpus directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusReport {
    pub files: usize,
    pub skipped: usize,
    pub chunks: usize,
}

pub struct Ingestor {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<SharedIndex>,
    chunking: ChunkingConfig,
    batch_size: usize,
    extract_timeout: Duration,
}

impl Ingestor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        index: Arc<SharedIndex>,
        chunking: ChunkingConfig,
        batch_size: usize,
        extract_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            chunking,
            batch_size: batch_size.max(1),
            extract_timeout,
        }
    }

    /// Ingest an uploaded document into the shared index.
    pub async fn ingest_file(&self, file: &UploadedFile) -> Result<IngestReport> {
        let text = self.extract(file.bytes.clone(), &file.mime_type).await?;
        let (chunks, vectors) = self.prepare(&text).await?;
        let chunk_ids = if chunks.is_empty() {
            Vec::new()
        } else {
            self.index.add(chunks, vectors).await?
        };
        info!(
            filename = %file.filename,
            chunks = chunk_ids.len(),
            "ingested document"
        );
        Ok(IngestReport {
            filename: file.filename.clone(),
            chunk_ids,
            text,
        })
    }

    /// Ingest every supported file under `dir` into the shared index.
    ///
    /// Files that fail to extract are logged and skipped.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<CorpusReport> {
        let mut report = CorpusReport::default();
        for path in corpus_files(dir)? {
            let prepared = match self.prepare_path(&path).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corpus file");
                    report.skipped += 1;
                    continue;
                }
            };
            let (chunks, vectors) = prepared;
            if !chunks.is_empty() {
                report.chunks += self.index.add(chunks, vectors).await?.len();
            }
            report.files += 1;
        }
        info!(dir = %dir.display(), ?report, "corpus ingested");
        Ok(report)
    }

    /// Build a fresh index from `dir` and publish it in place of the current
    /// one. The previous index stays live until the new one is saved.
    pub async fn rebuild_from_dir(&self, dir: &Path) -> Result<CorpusReport> {
        let mut fresh = FlatIndex::new();
        let mut report = CorpusReport::default();
        for path in corpus_files(dir)? {
            match self.prepare_path(&path).await {
                Ok((chunks, vectors)) => {
                    if !chunks.is_empty() {
                        report.chunks += fresh.add(chunks, vectors)?.len();
                    }
                    report.files += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corpus file");
                    report.skipped += 1;
                }
            }
        }
        self.index.replace(fresh).await?;
        info!(dir = %dir.display(), ?report, "index rebuilt");
        Ok(report)
    }

    async fn prepare_path(&self, path: &Path) -> Result<(Vec<PendingChunk>, Vec<Vec<f32>>)> {
        let name = path.to_string_lossy();
        let mime = mime_from_filename(&name)
            .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))?;
        let bytes = tokio::fs::read(path).await?;
        let text = self.extract(bytes, mime).await?;
        self.prepare(&text).await
    }

    /// Run the extractor under `extract_timeout`.
    async fn extract(&self, bytes: Vec<u8>, mime: &str) -> Result<String> {
        tokio::time::timeout(self.extract_timeout, self.extractor.extract(bytes, mime))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.extract_timeout, mime, "document extraction timed out");
                Error::ExternalTimeout {
                    capability: "extraction",
                    secs: self.extract_timeout.as_secs(),
                }
            })?
    }

    /// Chunk `text` and embed the chunks batch by batch.
    async fn prepare(&self, text: &str) -> Result<(Vec<PendingChunk>, Vec<Vec<f32>>)> {
        let chunks = chunk_spans(text, self.chunking.size, self.chunking.overlap)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = i, size = batch.len(), "embedding chunk batch");
            vectors.extend(self.embedder.embed(batch).await?);
        }
        Ok((chunks, vectors))
    }
}

/// Supported files under `dir`, sorted for deterministic id assignment.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if mime_from_filename(&entry.file_name().to_string_lossy()).is_some() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_corpus_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("acts")).unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("acts").join("a.pdf"), "a").unwrap();
        fs::write(dir.path().join("image.png"), "x").unwrap();
        fs::write(dir.path().join("c.docx"), "c").unwrap();

        let files = corpus_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["acts/a.pdf", "b.txt", "c.docx"]);
    }

    #[test]
    fn test_corpus_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(corpus_files(&dir.path().join("missing")).is_err());
    }
}
