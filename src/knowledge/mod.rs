//! Knowledge corpus indexing and retrieval.

pub mod chunker;
pub mod corpus;
pub mod embedder;
pub mod index;
pub mod retriever;

pub use chunker::ChunkConfig;
pub use corpus::CorpusScanner;
pub use index::{LocalVectorIndex, VectorIndex};
pub use retriever::KnowledgeBase;
