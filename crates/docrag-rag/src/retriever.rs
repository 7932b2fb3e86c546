use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use docrag_core::traits::Embedder;
use docrag_core::types::ContextRecord;
use docrag_core::{Error, Result};
use docrag_index::{IndexPaths, IndexSnapshot};

/// Query-side view of one index location.
///
/// The snapshot is read from disk on first use and kept until it is replaced
/// with [`swap`](Self::swap) or dropped with [`invalidate`](Self::invalidate).
/// Queries running during a swap finish on the snapshot they started with.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    paths: IndexPaths,
    active: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, paths: IndexPaths) -> Self {
        Self { embedder, paths, active: RwLock::new(None) }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn is_loaded(&self) -> bool {
        self.active.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Active snapshot, loading it from disk if nothing is cached.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        if let Some(s) = self.active.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(s));
        }
        let mut guard = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(s) = guard.as_ref() {
            return Ok(Arc::clone(s));
        }
        let loaded = Arc::new(IndexSnapshot::load(&self.paths)?);
        debug!(dir = %self.paths.dir.display(), entries = loaded.len(), "retriever loaded index");
        *guard = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Replaces the active snapshot; in-flight queries keep the old one.
    pub fn swap(&self, snapshot: Arc<IndexSnapshot>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Forgets the cached snapshot so the next query reloads from disk.
    pub fn invalidate(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Embeds `query` and returns up to `top_k` chunks, most similar first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ContextRecord>> {
        let snapshot = self.snapshot()?;
        let mut embedded = self.embedder.embed_batch(&[query.to_string()]).map_err(Error::Provider)?;
        let query_vec = embedded
            .pop()
            .ok_or_else(|| Error::Provider(anyhow::anyhow!("embedder returned no vector for the query")))?;
        let hits = snapshot.search(&query_vec, top_k)?;
        debug!(top_k, hits = hits.len(), best = hits.first().map(|h| h.score), "retrieved");
        Ok(hits.iter().map(|h| ContextRecord::from_hit(&h.meta, h.score)).collect())
    }
}
