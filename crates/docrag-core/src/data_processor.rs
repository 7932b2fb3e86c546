use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::chunker::{chunks, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::{ChunkMeta, Document};

/// File extensions accepted as plain-text documents (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Turns a folder of documents into chunk metadata records.
#[derive(Debug, Default, Clone)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Result<Self> {
        chunking_config.validate()?;
        Ok(Self { chunking_config })
    }

    pub fn chunking_config(&self) -> ChunkingConfig {
        self.chunking_config
    }

    /// Lists supported files directly inside `data_dir`, sorted by file name.
    ///
    /// Subdirectories are not descended into and unsupported files are skipped
    /// silently. An empty result is `NoDocumentsFound`.
    pub fn list_documents(&self, data_dir: &Path) -> Result<Vec<PathBuf>> {
        if !data_dir.is_dir() {
            return Err(Error::NoDocumentsFound { dir: data_dir.to_path_buf() });
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(data_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| Error::Read {
                path: e.path().map_or_else(|| data_dir.to_path_buf(), Path::to_path_buf),
                source: e.into(),
            })?;
            if entry.file_type().is_file() && is_supported(entry.path()) {
                files.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "skipping");
            }
        }
        if files.is_empty() {
            return Err(Error::NoDocumentsFound { dir: data_dir.to_path_buf() });
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    pub fn load_document(&self, file_path: &Path, doc_id: usize) -> Result<Document> {
        let text = read_file_content(file_path)?;
        let source_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string_lossy().into_owned());
        Ok(Document { source_name, doc_id, text })
    }

    pub fn chunk_document(&self, document: &Document) -> Result<Vec<ChunkMeta>> {
        Ok(chunks(&document.text, self.chunking_config)?
            .enumerate()
            .map(|(chunk_id, text)| ChunkMeta {
                doc_id: document.doc_id,
                source: document.source_name.clone(),
                chunk_id,
                text: text.to_string(),
            })
            .collect())
    }

    /// Reads one file and chunks it as document `doc_id`.
    pub fn process_document(&self, file_path: &Path, doc_id: usize) -> Result<Vec<ChunkMeta>> {
        let document = self.load_document(file_path, doc_id)?;
        let chunks = self.chunk_document(&document)?;
        debug!(source = %document.source_name, doc_id, chunks = chunks.len(), "chunked");
        Ok(chunks)
    }

    /// Reads and chunks every document in `data_dir`, assigning `doc_id` in listing order.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<ChunkMeta>> {
        let mut all_chunks = Vec::new();
        for (doc_id, file_path) in self.list_documents(data_dir)?.iter().enumerate() {
            all_chunks.extend(self.process_document(file_path, doc_id)?);
        }
        Ok(all_chunks)
    }
}

/// Reads a `.txt`/`.md` file, dropping bytes that are not valid UTF-8.
pub fn read_file_content(file_path: &Path) -> Result<String> {
    if !is_supported(file_path) {
        return Err(Error::UnsupportedFileType { path: file_path.to_path_buf() });
    }
    let bytes = fs::read(file_path).map_err(|source| Error::Read { path: file_path.to_path_buf(), source })?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => {
            warn!(path = %file_path.display(), "invalid UTF-8, dropping undecodable bytes");
            Ok(e.as_bytes().utf8_chunks().map(|c| c.valid()).collect())
        }
    }
}
