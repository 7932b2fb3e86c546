use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use docrag_core::config::{Config, Settings};
use docrag_core::data_processor::DataProcessor;
use docrag_core::traits::Embedder;
use docrag_core::types::ContextRecord;
use docrag_core::{Error, Result};
use docrag_embed::get_default_embedder;
use docrag_index::{IndexPaths, VectorIndex};

use crate::ingest::{ingest, IngestReport};
use crate::retriever::Retriever;

/// Owns the embedder and the active index for one corpus/index pair.
///
/// Construct once per process and share by reference; the embedding model is
/// loaded in the constructor and never again.
pub struct RagService {
    embedder: Arc<dyn Embedder>,
    processor: DataProcessor,
    corpus_dir: PathBuf,
    retriever: Retriever,
    top_k: usize,
    writer: Mutex<()>,
}

impl RagService {
    /// Builds the service from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings()?;
        let embedder = get_default_embedder(&settings.embedding, config.base_dir()).map_err(Error::Provider)?;
        Self::new(
            &settings,
            config.corpus_dir(&settings),
            &config.index_dir(&settings),
            Arc::from(embedder),
        )
    }

    pub fn new(settings: &Settings, corpus_dir: PathBuf, index_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        settings.validate()?;
        let processor = DataProcessor::new(settings.chunking)?;
        let retriever = Retriever::new(Arc::clone(&embedder), IndexPaths::new(index_dir));
        info!(
            corpus = %corpus_dir.display(),
            index = %index_dir.display(),
            embedder = embedder.id(),
            "rag service ready"
        );
        Ok(Self { embedder, processor, corpus_dir, retriever, top_k: settings.retrieval.top_k, writer: Mutex::new(()) })
    }

    pub fn corpus_dir(&self) -> &Path {
        &self.corpus_dir
    }

    pub fn default_top_k(&self) -> usize {
        self.top_k
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Retrieves with the configured `retrieval.top_k`.
    pub fn retrieve(&self, query: &str) -> Result<Vec<ContextRecord>> {
        self.retriever.retrieve(query, self.top_k)
    }

    pub fn retrieve_top(&self, query: &str, top_k: usize) -> Result<Vec<ContextRecord>> {
        self.retriever.retrieve(query, top_k)
    }

    /// Re-ingests the configured corpus directory.
    pub fn rebuild(&self) -> Result<IngestReport> {
        let dir = self.corpus_dir.clone();
        self.rebuild_from(&dir)
    }

    /// Re-ingests `data_dir` into the configured index location and makes the
    /// new index active. Queries keep the previous index if this fails.
    pub fn rebuild_from(&self, data_dir: &Path) -> Result<IngestReport> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut index = VectorIndex::new(&self.retriever.paths().dir);
        match ingest(data_dir, &self.processor, self.embedder.as_ref(), &mut index) {
            Ok(report) => {
                self.retriever.swap(Arc::clone(&report.snapshot));
                Ok(report)
            }
            Err(e) => {
                warn!(dir = %data_dir.display(), error = %e, "rebuild failed, keeping the active index");
                Err(e)
            }
        }
    }
}
