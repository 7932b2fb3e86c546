//! Domain types shared by the ingestion, index and retrieval crates.

use serde::{Deserialize, Serialize};

/// A single source file read during one ingestion pass.
///
/// - `source_name`: file name, unique within the run
/// - `doc_id`: position of the file in lexicographic order for this run only
/// - `text`: decoded file content
#[derive(Debug, Clone)]
pub struct Document {
    pub source_name: String,
    pub doc_id: usize,
    pub text: String,
}

/// Metadata stored next to every vector in the index.
///
/// Serialized field names match the persisted `metadata.json` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub doc_id: usize,
    pub source: String,
    pub chunk_id: usize,
    pub text: String,
}

/// A ranked retrieval result handed to answer generation.
///
/// `score` is the cosine similarity between the query and the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub score: f32,
    pub source: String,
    pub chunk_id: usize,
    pub doc_id: usize,
    pub text: String,
}

impl ContextRecord {
    pub fn from_hit(meta: &ChunkMeta, score: f32) -> Self {
        Self {
            score,
            source: meta.source.clone(),
            chunk_id: meta.chunk_id,
            doc_id: meta.doc_id,
            text: meta.text.clone(),
        }
    }
}
