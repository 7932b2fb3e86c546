//! Corpus folder -> chunks -> embeddings -> persisted index.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docrag_core::data_processor::DataProcessor;
use docrag_core::traits::Embedder;
use docrag_core::types::ChunkMeta;
use docrag_core::{Error, Result};
use docrag_index::{IndexSnapshot, VectorIndex};

/// What one ingestion run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub dim: usize,
    pub snapshot: Arc<IndexSnapshot>,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Reads and chunks every supported file in `data_dir`, embeds all chunks in a
/// single call and rebuilds `index` from them.
///
/// The previous index is only replaced once every step has succeeded. An empty
/// corpus fails with `NoDocumentsFound` before anything is embedded.
pub fn ingest(
    data_dir: &Path,
    processor: &DataProcessor,
    embedder: &dyn Embedder,
    index: &mut VectorIndex,
) -> Result<IngestReport> {
    let start = Instant::now();
    let files = processor.list_documents(data_dir)?;
    info!(dir = %data_dir.display(), files = files.len(), "ingesting corpus");

    let pb = progress_bar(files.len());
    let mut chunks: Vec<ChunkMeta> = Vec::new();
    for (doc_id, path) in files.iter().enumerate() {
        if let Some(name) = path.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        chunks.extend(processor.process_document(path, doc_id)?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    info!(chunks = texts.len(), embedder = embedder.id(), "embedding chunks");
    let vectors = embedder.embed_batch(&texts).map_err(Error::Provider)?;

    let snapshot = index.build(vectors, chunks)?;
    info!(
        documents = files.len(),
        chunks = snapshot.len(),
        dim = snapshot.dim(),
        ms = start.elapsed().as_millis() as u64,
        "ingestion complete"
    );
    Ok(IngestReport { documents: files.len(), chunks: snapshot.len(), dim: snapshot.dim(), snapshot })
}
