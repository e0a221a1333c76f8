//! Index persistence and the shared, swappable in-memory index.
//!
//! # On-disk format
//!
//! A single `index.json` inside the configured directory:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "dims": 768,
//!   "next_id": 42,
//!   "saved_at": "2026-01-01T00:00:00Z",
//!   "checksum": "<sha256 hex>",
//!   "entries": [{ "id": 0, "text": "...", "start": 0, "end": 2000, "vector": "<base64>" }]
//! }
//! ```
//!
//! `vector` is base64 of the little-endian `f32` blob, so a save/load cycle
//! is bit-exact. The checksum covers ids, offsets, text and vector bytes.
//! Writes go to a temporary file that is fsynced and renamed over the
//! previous one; a crash mid-save leaves the old file intact.
//!
//! # Concurrency
//!
//! [`SharedIndex`] hands readers an `Arc<FlatIndex>` snapshot. Writers are
//! serialised by an async mutex, build the next index from a clone of the
//! current snapshot, persist it, and only then publish it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use lexrag_core::embedding::{blob_to_vec, vec_to_blob};
use lexrag_core::index::{FlatIndex, IndexEntry, VectorIndex};
use lexrag_core::models::{Chunk, PendingChunk};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const INDEX_FILE: &str = "index.json";
const TMP_EXTENSION: &str = "json.tmp";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    format_version: u32,
    dims: Option<usize>,
    next_id: u64,
    saved_at: DateTime<Utc>,
    checksum: String,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    id: u64,
    text: String,
    start: usize,
    end: usize,
    vector: String,
}

/// Reads and writes the persisted index under one directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Persist `index`, replacing any previous file atomically.
    pub fn save(&self, index: &FlatIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let doc = PersistedIndex {
            format_version: FORMAT_VERSION,
            dims: index.dims(),
            next_id: index.next_id(),
            saved_at: Utc::now(),
            checksum: checksum(index.dims(), index.next_id(), index.entries()),
            entries: index
                .entries()
                .iter()
                .map(|e| PersistedEntry {
                    id: e.chunk.id,
                    text: e.chunk.text.clone(),
                    start: e.chunk.source_offset.start,
                    end: e.chunk.source_offset.end,
                    vector: BASE64.encode(vec_to_blob(&e.vector)),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec(&doc)
            .map_err(|e| Error::IndexCorrupt(format!("serialization failed: {}", e)))?;

        write_atomic(&self.path(), &bytes)?;
        debug!(path = %self.path().display(), chunks = index.len(), "index saved");
        Ok(())
    }

    /// Load the persisted index.
    ///
    /// # Errors
    ///
    /// - `IndexNotFound` when no file exists.
    /// - `IndexCorrupt` when the file cannot be parsed, has an unknown
    ///   version, fails its checksum, or violates an index invariant.
    pub fn load(&self) -> Result<FlatIndex> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::IndexNotFound(path))
            }
            Err(e) => return Err(e.into()),
        };

        let doc: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| Error::IndexCorrupt(format!("unreadable index file: {}", e)))?;
        if doc.format_version != FORMAT_VERSION {
            return Err(Error::IndexCorrupt(format!(
                "unsupported format version {}",
                doc.format_version
            )));
        }

        let mut entries = Vec::with_capacity(doc.entries.len());
        for e in doc.entries {
            if e.start > e.end {
                return Err(Error::IndexCorrupt(format!(
                    "chunk {} has offsets {}..{}",
                    e.id, e.start, e.end
                )));
            }
            let blob = BASE64
                .decode(e.vector.as_bytes())
                .map_err(|err| Error::IndexCorrupt(format!("chunk {}: {}", e.id, err)))?;
            let vector = blob_to_vec(&blob).ok_or_else(|| {
                Error::IndexCorrupt(format!("chunk {}: vector length {} bytes", e.id, blob.len()))
            })?;
            entries.push(IndexEntry {
                chunk: Chunk {
                    id: e.id,
                    text: e.text,
                    source_offset: e.start..e.end,
                },
                vector,
            });
        }

        if checksum(doc.dims, doc.next_id, &entries) != doc.checksum {
            return Err(Error::IndexCorrupt("checksum mismatch".to_string()));
        }

        let index = FlatIndex::from_parts(entries, doc.dims, doc.next_id)
            .map_err(|e| Error::IndexCorrupt(e.to_string()))?;
        info!(
            path = %path.display(),
            chunks = index.len(),
            saved_at = %doc.saved_at,
            "index loaded"
        );
        Ok(index)
    }
}

fn checksum(dims: Option<usize>, next_id: u64, entries: &[IndexEntry]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((dims.unwrap_or(0) as u64).to_le_bytes());
    hasher.update(next_id.to_le_bytes());
    for e in entries {
        hasher.update(e.chunk.id.to_le_bytes());
        hasher.update((e.chunk.source_offset.start as u64).to_le_bytes());
        hasher.update((e.chunk.source_offset.end as u64).to_le_bytes());
        hasher.update((e.chunk.text.len() as u64).to_le_bytes());
        hasher.update(e.chunk.text.as_bytes());
        hasher.update(vec_to_blob(&e.vector));
    }
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(TMP_EXTENSION);
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Io(e)
    })?;
    sync_parent(path)
}

/// Make the rename itself durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}

/// The process-wide index. Readers take snapshots; the single writer
/// publishes only after a successful save.
///
/// Each write (clone, add, save, publish) runs as its own spawned task, so a
/// caller that is dropped mid-write cannot leave the saved file ahead of the
/// published snapshot.
#[derive(Clone)]
pub struct SharedIndex {
    inner: Arc<Inner>,
}

struct Inner {
    current: RwLock<Arc<FlatIndex>>,
    writer: tokio::sync::Mutex<()>,
    store: IndexStore,
}

impl SharedIndex {
    pub fn new(index: FlatIndex, store: IndexStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(index)),
                writer: tokio::sync::Mutex::new(()),
                store,
            }),
        }
    }

    /// The current published index. Never observes a partial write.
    pub fn snapshot(&self) -> Arc<FlatIndex> {
        self.inner.current.read().clone()
    }

    pub fn store(&self) -> &IndexStore {
        &self.inner.store
    }

    /// Add chunks, persist, then publish. On any error neither the
    /// persisted nor the in-memory index changes.
    pub async fn add(&self, chunks: Vec<PendingChunk>, vectors: Vec<Vec<f32>>) -> Result<Vec<u64>> {
        let inner = Arc::clone(&self.inner);
        detach(async move {
            let _guard = inner.writer.lock().await;
            let mut next = (**inner.current.read()).clone();
            let ids = next.add(chunks, vectors)?;
            inner.persist_and_publish(next).await?;
            Ok::<_, Error>(ids)
        })
        .await
    }

    /// Replace the whole index (used by rebuilds).
    pub async fn replace(&self, index: FlatIndex) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detach(async move {
            let _guard = inner.writer.lock().await;
            inner.persist_and_publish(index).await
        })
        .await
    }
}

impl Inner {
    async fn persist_and_publish(&self, index: FlatIndex) -> Result<()> {
        let next = Arc::new(index);
        let store = self.store.clone();
        let to_save = Arc::clone(&next);
        tokio::task::spawn_blocking(move || store.save(&to_save))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        *self.current.write() = next;
        Ok(())
    }
}

/// Run `write` to completion even if the awaiting caller goes away.
async fn detach<T, F>(write: F) -> Result<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(write)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}
