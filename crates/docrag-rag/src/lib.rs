//! Ingestion, retrieval and evaluation on top of the embedding and index crates.

pub mod eval;
pub mod ingest;
pub mod retriever;
pub mod service;

pub use ingest::{ingest, IngestReport};
pub use retriever::Retriever;
pub use service::RagService;
