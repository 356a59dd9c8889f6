//! Knowledge base: retrieval and full reindex.

use crate::knowledge::chunker::{chunk_text, ChunkConfig};
use crate::knowledge::corpus::CorpusScanner;
use crate::knowledge::embedder::Embedder;
use crate::knowledge::index::{Collection, IndexedChunk, VectorIndex};
use crate::models::{KnowledgeSnippet, ReindexReport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Retrieval-augmentation source backed by an embedder and a vector index.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    corpus: CorpusScanner,
    chunking: ChunkConfig,
    /// Held for the whole of a reindex; queries never take it.
    reindex_lock: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        corpus: CorpusScanner,
        chunking: ChunkConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            corpus,
            chunking,
            reindex_lock: Mutex::new(()),
        }
    }

    /// Chunks in the current index; 0 when the backend cannot answer.
    pub async fn indexed_chunks(&self) -> usize {
        match self.index.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!("Knowledge index count failed: {}", e);
                0
            }
        }
    }

    /// Snippets most relevant to `topic`, best first.
    ///
    /// Never fails: backend errors and an empty index yield no snippets.
    pub async fn retrieve(&self, topic: &str, top_k: usize) -> Vec<KnowledgeSnippet> {
        if top_k == 0 || self.indexed_chunks().await == 0 {
            return Vec::new();
        }

        let identity = self.embedder.identity();
        match self.index.embedder().await {
            Ok(Some(built)) if built != identity => {
                warn!(
                    "Knowledge index was built with {}, current embedder is {}; run reindex",
                    built, identity
                );
                return Vec::new();
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Knowledge index metadata unavailable: {}", e);
                return Vec::new();
            }
        }

        let query = match self.embedder.embed(&[topic.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.swap_remove(0),
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!("Embedding failed for topic {:?}: {}", topic, e);
                return Vec::new();
            }
        };

        match self.index.query(&query, top_k).await {
            Ok(hits) => {
                debug!("Retrieved {} snippets for {:?}", hits.len(), topic);
                hits.into_iter()
                    .map(|h| KnowledgeSnippet {
                        chunk: h.text,
                        source: h.source,
                    })
                    .collect()
            }
            Err(e) => {
                warn!("Knowledge query failed for {:?}: {}", topic, e);
                Vec::new()
            }
        }
    }

    /// Rebuild the index from the corpus directory.
    ///
    /// The new collection is built aside and swapped in only when complete;
    /// on any failure the current index stays in place. Concurrent calls
    /// are serialized.
    pub async fn reindex(&self) -> ReindexReport {
        let _guard = self.reindex_lock.lock().await;

        let documents = self.corpus.load();
        if documents.is_empty() {
            warn!("No *.md files found in {}", self.corpus.root().display());
            return ReindexReport::failed(format!(
                "No *.md files found in {}",
                self.corpus.root().display()
            ));
        }

        let files: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();

        let mut ids = Vec::new();
        let mut texts = Vec::new();
        let mut sources = Vec::new();
        for (doc_index, doc) in documents.iter().enumerate() {
            for (chunk_index, chunk) in chunk_text(&doc.text, self.chunking).into_iter().enumerate() {
                ids.push(format!("{}-{}-{}", doc.stem, doc_index, chunk_index));
                texts.push(chunk);
                sources.push(doc.name.clone());
            }
        }

        info!("Embedding {} chunks from {} documents", texts.len(), files.len());
        let embeddings = match self.embedder.embed(&texts).await {
            Ok(e) => e,
            Err(e) => {
                warn!("Reindex aborted, embedding failed: {}", e);
                return ReindexReport {
                    files,
                    ..ReindexReport::failed(format!("Embedding failed: {}", e))
                };
            }
        };

        let chunks: Vec<IndexedChunk> = ids
            .into_iter()
            .zip(texts)
            .zip(sources)
            .zip(embeddings)
            .map(|(((id, text), source), embedding)| IndexedChunk {
                id,
                text,
                source,
                embedding,
            })
            .collect();

        let indexed = chunks.len();
        let swapped = match Collection::new(self.embedder.identity(), chunks) {
            Ok(collection) => self.index.replace(collection).await,
            Err(e) => Err(e),
        };

        if let Err(e) = swapped {
            warn!("Reindex aborted, index update failed: {}", e);
            return ReindexReport {
                files,
                ..ReindexReport::failed(format!("Index update failed: {}", e))
            };
        }

        info!("Indexed {} chunks from {} documents", indexed, files.len());
        ReindexReport {
            ok: true,
            indexed,
            files,
            detail: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::local_kb;
    use super::*;
    use crate::knowledge::embedder::{EmbedError, HashingEmbedder};
    use crate::knowledge::index::LocalVectorIndex;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Status {
                status: 503,
                body: "loading model".to_string(),
            })
        }

        fn identity(&self) -> String {
            "failing".to_string()
        }
    }

    fn write_corpus(dir: &Path) {
        fs::write(
            dir.join("hvac.md"),
            "# HVAC remediation runbook\n\nCheck chiller compressor and refrigerant levels. Replace CRAC filters.",
        )
        .unwrap();
        fs::write(
            dir.join("fire.md"),
            "# Fire suppression\n\nInspect extinguishers and sprinkler heads quarterly.",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kb = local_kb(dir.path());
        assert!(kb.retrieve("HVAC remediation runbook", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_without_documents() {
        let dir = tempfile::tempdir().unwrap();
        let kb = local_kb(dir.path());
        let report = kb.reindex().await;
        assert!(!report.ok);
        assert_eq!(report.indexed, 0);
        assert!(report.detail.unwrap().contains("No *.md files"));
    }

    #[tokio::test]
    async fn test_reindex_then_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let kb = local_kb(dir.path());

        let report = kb.reindex().await;
        assert!(report.ok);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.files, vec!["fire.md", "hvac.md"]);

        let snippets = kb.retrieve("HVAC remediation runbook", 1).await;
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].source, "hvac.md");
        assert!(snippets[0].chunk.contains("chiller"));
    }

    #[tokio::test]
    async fn test_chunk_ids_are_unique_across_documents() {
        let dir = tempfile::tempdir().unwrap();
        let long = "Rotate the UPS battery strings and record impedance. ".repeat(80);
        fs::write(dir.path().join("ups.md"), &long).unwrap();
        fs::write(dir.path().join("ups2.md"), &long).unwrap();

        let kb = local_kb(dir.path());
        let report = kb.reindex().await;
        assert!(report.ok);
        assert!(report.indexed > 2);
    }

    #[tokio::test]
    async fn test_empty_corpus_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let kb = local_kb(dir.path());
        assert!(kb.reindex().await.ok);

        fs::remove_file(dir.path().join("hvac.md")).unwrap();
        fs::remove_file(dir.path().join("fire.md")).unwrap();

        let report = kb.reindex().await;
        assert!(!report.ok);
        assert_eq!(kb.indexed_chunks().await, 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index_and_retrieval_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let index: Arc<dyn VectorIndex> = Arc::new(LocalVectorIndex::in_memory());

        let good = KnowledgeBase::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::clone(&index),
            CorpusScanner::new(dir.path()),
            ChunkConfig::default(),
        );
        assert!(good.reindex().await.ok);

        let failing = KnowledgeBase::new(
            Arc::new(FailingEmbedder),
            Arc::clone(&index),
            CorpusScanner::new(dir.path()),
            ChunkConfig::default(),
        );
        let report = failing.reindex().await;
        assert!(!report.ok);
        assert_eq!(report.indexed, 0);
        assert!(report.detail.unwrap().contains("Embedding failed"));
        assert_eq!(index.count().await.unwrap(), 2);

        assert!(failing.retrieve("HVAC", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_changed_embedder_requires_reindex() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let index: Arc<dyn VectorIndex> = Arc::new(LocalVectorIndex::in_memory());

        let original = KnowledgeBase::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::clone(&index),
            CorpusScanner::new(dir.path()),
            ChunkConfig::default(),
        );
        assert!(original.reindex().await.ok);
        assert_eq!(original.retrieve("HVAC remediation runbook", 1).await.len(), 1);

        let switched = KnowledgeBase::new(
            Arc::new(HashingEmbedder::new(128)),
            Arc::clone(&index),
            CorpusScanner::new(dir.path()),
            ChunkConfig::default(),
        );
        assert!(switched.retrieve("HVAC remediation runbook", 1).await.is_empty());

        assert!(switched.reindex().await.ok);
        assert_eq!(index.embedder().await.unwrap().as_deref(), Some("hashing:128"));
        assert_eq!(switched.retrieve("HVAC remediation runbook", 1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reindex_is_serialized() {
        let dir = tempfile::tempdir().unwrap();
        write_corpus(dir.path());
        let kb = Arc::new(local_kb(dir.path()));

        let (a, b) = tokio::join!(kb.reindex(), kb.reindex());
        assert!(a.ok && b.ok);
        assert_eq!(kb.indexed_chunks().await, 2);
    }
}
