//! Exact cosine-similarity vector index with parallel chunk metadata.
//!
//! Vectors are L2-normalized on the way in, so cosine similarity is the inner
//! product. The position a vector is added at is its key: search reports that
//! ordinal and it indexes the metadata list. The pair is persisted as one
//! logical unit (see [`persist`]).

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use docrag_core::types::ChunkMeta;
use docrag_core::{Error, Result};

pub mod flat;
pub mod persist;
pub mod schema;

pub use flat::{l2_normalize, FlatIpIndex, NO_RESULT};
pub use persist::{Generation, IndexPaths};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub ordinal: usize,
    pub score: f32,
    pub meta: ChunkMeta,
}

/// Immutable, searchable contents of one index build.
///
/// Shared behind an `Arc` so readers keep using a snapshot while a rebuild
/// produces the next one.
#[derive(Debug)]
pub struct IndexSnapshot {
    flat: FlatIpIndex,
    metadata: Vec<ChunkMeta>,
}

impl IndexSnapshot {
    /// Validates and normalizes build input.
    pub fn from_embeddings(vectors: Vec<Vec<f32>>, metadata: Vec<ChunkMeta>) -> Result<Self> {
        if vectors.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if vectors.len() != metadata.len() {
            return Err(Error::LengthMismatch { vectors: vectors.len(), metadata: metadata.len() });
        }
        let dim = vectors[0].len();
        if dim == 0 {
            return Err(Error::DimensionMismatch { position: 0, expected: 1, actual: 0 });
        }
        let mut flat = FlatIpIndex::new(dim);
        for (position, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { position, expected: dim, actual: v.len() });
            }
            l2_normalize(&mut v);
            flat.push(&v);
        }
        Ok(Self { flat, metadata })
    }

    pub fn load(paths: &IndexPaths) -> Result<Self> {
        let (flat, metadata) = persist::read_index(paths)?;
        Ok(Self { flat, metadata })
    }

    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        persist::write_index(paths, &self.flat, &self.metadata)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.flat.dim()
    }

    pub fn metadata(&self) -> &[ChunkMeta] {
        &self.metadata
    }

    /// Normalized vector stored at `ordinal`.
    pub fn vector(&self, ordinal: usize) -> &[f32] {
        self.flat.vector(ordinal)
    }

    /// Top `top_k` entries by cosine similarity, best first, ties by ascending ordinal.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim() {
            return Err(Error::DimensionMismatch { position: 0, expected: self.dim(), actual: query.len() });
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);
        let (scores, ids) = self.flat.search(&q, top_k.min(self.len()));
        Ok(ids
            .into_iter()
            .zip(scores)
            .filter(|(id, _)| *id != NO_RESULT)
            .filter_map(|(id, score)| {
                let ordinal = usize::try_from(id).ok()?;
                let meta = self.metadata.get(ordinal)?.clone();
                Some(SearchHit { ordinal, score, meta })
            })
            .collect())
    }
}

/// Lifecycle of a [`VectorIndex`].
#[derive(Debug, Clone)]
pub enum IndexState {
    /// Nothing in memory yet.
    Unloaded,
    /// Built in this process, not yet written.
    Built(Arc<IndexSnapshot>),
    /// Built in this process and written to disk.
    Persisted(Arc<IndexSnapshot>),
    /// Read back from disk.
    Loaded(Arc<IndexSnapshot>),
}

impl IndexState {
    pub fn snapshot(&self) -> Option<&Arc<IndexSnapshot>> {
        match self {
            IndexState::Unloaded => None,
            IndexState::Built(s) | IndexState::Persisted(s) | IndexState::Loaded(s) => Some(s),
        }
    }
}

/// Owner of one on-disk index location and its in-memory state.
pub struct VectorIndex {
    paths: IndexPaths,
    state: IndexState,
}

impl VectorIndex {
    pub fn new(dir: &Path) -> Self {
        Self { paths: IndexPaths::new(dir), state: IndexState::Unloaded }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn state(&self) -> &IndexState {
        &self.state
    }

    /// Builds from embeddings and persists immediately.
    ///
    /// On any error the previous state and files are left as they were.
    pub fn build(&mut self, vectors: Vec<Vec<f32>>, metadata: Vec<ChunkMeta>) -> Result<Arc<IndexSnapshot>> {
        let snapshot = Arc::new(IndexSnapshot::from_embeddings(vectors, metadata)?);
        snapshot.save(&self.paths)?;
        info!(dir = %self.paths.dir.display(), entries = snapshot.len(), dim = snapshot.dim(), "vector index built and saved");
        self.state = IndexState::Persisted(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Builds in memory only; call [`save`](Self::save) to persist.
    pub fn stage(&mut self, vectors: Vec<Vec<f32>>, metadata: Vec<ChunkMeta>) -> Result<()> {
        let snapshot = IndexSnapshot::from_embeddings(vectors, metadata)?;
        info!(entries = snapshot.len(), dim = snapshot.dim(), "vector index built");
        self.state = IndexState::Built(Arc::new(snapshot));
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let snapshot = match &self.state {
            IndexState::Unloaded => return Err(Error::UninitializedIndex),
            IndexState::Built(s) | IndexState::Persisted(s) | IndexState::Loaded(s) => Arc::clone(s),
        };
        snapshot.save(&self.paths)?;
        info!(dir = %self.paths.dir.display(), entries = snapshot.len(), "vector index saved");
        if let IndexState::Built(_) = self.state {
            self.state = IndexState::Persisted(snapshot);
        }
        Ok(())
    }

    /// Reads the persisted pair, replacing whatever is in memory.
    pub fn load(&mut self) -> Result<()> {
        let snapshot = IndexSnapshot::load(&self.paths)?;
        debug!(dir = %self.paths.dir.display(), entries = snapshot.len(), "vector index loaded");
        self.state = IndexState::Loaded(Arc::new(snapshot));
        Ok(())
    }

    /// Current snapshot, loading from disk first when unloaded.
    pub fn snapshot(&mut self) -> Result<Arc<IndexSnapshot>> {
        if let IndexState::Unloaded = self.state {
            self.load()?;
        }
        self.state.snapshot().cloned().ok_or(Error::UninitializedIndex)
    }

    pub fn search(&mut self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.snapshot()?.search(query, top_k)
    }
}
