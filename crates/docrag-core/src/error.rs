use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no .txt or .md files found in {}; place your documents there", dir.display())]
    NoDocumentsFound { dir: PathBuf },

    #[error("unsupported file type: {}; supported: .txt, .md", path.display())]
    UnsupportedFileType { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no embeddings to build index")]
    EmptyIndex,

    #[error("got {vectors} vectors but {metadata} metadata records")]
    LengthMismatch { vectors: usize, metadata: usize },

    #[error("vector {position} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("index or metadata not found at {}; please run ingestion first", path.display())]
    IndexNotFound { path: PathBuf },

    #[error("index is not initialized")]
    UninitializedIndex,

    #[error("invalid chunking: max_chars={max_chars}, overlap={overlap} (need max_chars > overlap >= 0)")]
    InvalidChunking { max_chars: usize, overlap: usize },

    #[error("corrupt index artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failure reported by an external collaborator (embedding model, remote API).
    #[error(transparent)]
    Provider(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
