//! Vector index capability and the local implementation.
//!
//! A [`Collection`] is built aside and handed to [`VectorIndex::replace`],
//! which swaps it in atomically. Readers always see either the previous
//! collection or the new one in full, never a partial build.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("duplicate chunk id in collection: {0}")]
    DuplicateId(String),

    #[error("chunk {id} has {got} dimensions, collection has {expected}")]
    DimensionMismatch { id: String, expected: usize, got: usize },
}

/// A chunk with its embedding and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

/// A complete, immutable set of indexed chunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Collection {
    pub built_at: Option<DateTime<Utc>>,
    /// Identity of the embedder that produced the vectors. Empty when unknown.
    #[serde(default)]
    pub embedder: String,
    /// Length of every embedding; 0 for an empty collection.
    #[serde(default)]
    pub dimensions: usize,
    pub chunks: Vec<IndexedChunk>,
}

impl Collection {
    /// Build a collection, rejecting duplicate chunk ids and embeddings of
    /// differing length.
    pub fn new(embedder: impl Into<String>, chunks: Vec<IndexedChunk>) -> Result<Self, IndexError> {
        let dimensions = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
        let mut seen = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            if !seen.insert(chunk.id.as_str()) {
                return Err(IndexError::DuplicateId(chunk.id.clone()));
            }
            if chunk.embedding.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    id: chunk.id.clone(),
                    expected: dimensions,
                    got: chunk.embedding.len(),
                });
            }
        }
        Ok(Self {
            built_at: Some(Utc::now()),
            embedder: embedder.into(),
            dimensions,
            chunks,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A ranked query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Vector index capability.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Number of chunks in the current collection.
    async fn count(&self) -> Result<usize, IndexError>;

    /// Embedder identity recorded with the current collection, if any.
    async fn embedder(&self) -> Result<Option<String>, IndexError>;

    /// The `k` chunks most similar to `embedding`, best first. A query
    /// whose length differs from the collection's vectors has no hits.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError>;

    /// Atomically replace the current collection.
    async fn replace(&self, collection: Collection) -> Result<(), IndexError>;
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// In-process index, optionally persisted as JSON.
pub struct LocalVectorIndex {
    current: RwLock<Arc<Collection>>,
    path: Option<PathBuf>,
}

impl LocalVectorIndex {
    /// Index without persistence.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(Arc::new(Collection::default())),
            path: None,
        }
    }

    /// Index persisted at `path`. A missing file means an empty index; an
    /// unreadable one is logged and treated the same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let collection = match Self::load(&path) {
            Ok(Some(c)) => {
                info!("Loaded knowledge index with {} chunks from {}", c.len(), path.display());
                c
            }
            Ok(None) => {
                debug!("No knowledge index at {}", path.display());
                Collection::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable knowledge index: {}", e);
                Collection::default()
            }
        };

        Self {
            current: RwLock::new(Arc::new(collection)),
            path: Some(path),
        }
    }

    fn load(path: &Path) -> Result<Option<Collection>, IndexError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write to a temp file next to `path`, then rename over it.
    fn persist(path: &Path, collection: &Collection) -> Result<(), IndexError> {
        let io_err = |source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        serde_json::to_writer(&mut tmp, collection)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    async fn snapshot(&self) -> Arc<Collection> {
        Arc::clone(&*self.current.read().await)
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.snapshot().await.len())
    }

    async fn embedder(&self) -> Result<Option<String>, IndexError> {
        let collection = self.snapshot().await;
        Ok(Some(collection.embedder.clone()).filter(|e| !e.is_empty()))
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        let collection = self.snapshot().await;
        if collection.is_empty() {
            return Ok(Vec::new());
        }

        // Older index files carry no recorded size.
        let dimensions = match collection.dimensions {
            0 => collection.chunks[0].embedding.len(),
            n => n,
        };
        if embedding.len() != dimensions {
            warn!(
                "Query vector has {} dimensions, index has {}; reindex after changing the embedder",
                embedding.len(),
                dimensions
            );
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = collection
            .chunks
            .iter()
            .map(|c| (cosine_similarity(embedding, &c.embedding), c))
            .collect();

        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, c)| IndexHit {
                id: c.id.clone(),
                text: c.text.clone(),
                source: c.source.clone(),
                score,
            })
            .collect())
    }

    async fn replace(&self, collection: Collection) -> Result<(), IndexError> {
        if let Some(ref path) = self.path {
            Self::persist(path, &collection)?;
        }

        let count = collection.len();
        *self.current.write().await = Arc::new(collection);
        debug!("Swapped in knowledge collection with {} chunks", count);
        Ok(())
    }
}
