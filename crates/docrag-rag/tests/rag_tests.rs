use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use docrag_core::config::Settings;
use docrag_core::data_processor::DataProcessor;
use docrag_core::traits::Embedder;
use docrag_core::Error;
use docrag_embed::HashingEmbedder;
use docrag_index::VectorIndex;
use docrag_rag::{ingest, RagService};
use tempfile::TempDir;

const PAYMENT: &str = "Payment terms: invoices due net 30 days from invoice date. \
Payment terms cover deposits, milestones and retention.";
const SAFETY: &str = "Safety requirements: hard hats, boots and vests on site. \
Safety requirements include daily briefings and signed checklists.";

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("a.txt"), PAYMENT).unwrap();
    fs::write(dir.join("b.txt"), SAFETY).unwrap();
}

fn service(tmp: &TempDir) -> RagService {
    let corpus = tmp.path().join("data");
    write_corpus(&corpus);
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(1024));
    RagService::new(&Settings::default(), corpus, &tmp.path().join("artifacts"), embedder).expect("service")
}

#[test]
fn two_document_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let svc = service(&tmp);
    let report = svc.rebuild().expect("rebuild");
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.dim, 1024);

    let payment = svc.retrieve("What are the payment terms?").expect("retrieve");
    assert_eq!(payment.len(), 2);
    assert_eq!(payment[0].source, "a.txt");
    assert_eq!(payment[0].doc_id, 0);
    assert_eq!(payment[0].chunk_id, 0);
    assert_eq!(payment[0].text, PAYMENT);
    assert!(payment[0].score > payment[1].score);

    let safety = svc.retrieve("What are the safety requirements?").expect("retrieve");
    assert_eq!(safety[0].source, "b.txt");
    assert_eq!(safety[0].doc_id, 1);
}

/// `phrase` repeated and cut to exactly `len` characters.
fn block(phrase: &str, len: usize) -> String {
    phrase.chars().cycle().take(len).collect()
}

#[test]
fn thousand_character_blocks_discriminate_between_documents() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("data");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("a.txt"), block("Payment terms: net 30 days. ", 1000)).unwrap();
    fs::write(corpus.join("b.txt"), block("Safety requirements: hard hats required. ", 1000)).unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(1024));
    let svc = RagService::new(&Settings::default(), corpus, &tmp.path().join("artifacts"), embedder).expect("service");

    // 800/200 over 1000 chars: windows at 0 and 600 in each file
    let report = svc.rebuild().expect("rebuild");
    assert_eq!(report.chunks, 4);
    let layout: Vec<(&str, usize)> =
        report.snapshot.metadata().iter().map(|m| (m.source.as_str(), m.chunk_id)).collect();
    assert_eq!(layout, vec![("a.txt", 0), ("a.txt", 1), ("b.txt", 0), ("b.txt", 1)]);

    let payment = svc.retrieve_top("What are the payment terms?", 4).expect("retrieve");
    let safety = svc.retrieve_top("What safety gear is required?", 4).expect("retrieve");
    assert_eq!(payment[0].source, "a.txt");
    assert_eq!(safety[0].source, "b.txt");

    // Each query scores its own document's chunks above every chunk of the other one.
    let best_of = |hits: &[docrag_core::types::ContextRecord], source: &str| {
        hits.iter().filter(|h| h.source == source).map(|h| h.score).fold(f32::NEG_INFINITY, f32::max)
    };
    let worst_of = |hits: &[docrag_core::types::ContextRecord], source: &str| {
        hits.iter().filter(|h| h.source == source).map(|h| h.score).fold(f32::INFINITY, f32::min)
    };
    assert!(worst_of(&payment, "a.txt") > best_of(&payment, "b.txt"), "{payment:?}");
    assert!(worst_of(&safety, "b.txt") > best_of(&safety, "a.txt"), "{safety:?}");

    let safety_chunks: Vec<usize> = safety[..2].iter().map(|h| h.chunk_id).collect();
    assert!(safety[..2].iter().all(|h| h.source == "b.txt"));
    assert!(safety_chunks.contains(&0) && safety_chunks.contains(&1));
}

#[test]
fn fresh_service_loads_persisted_index_lazily() {
    let tmp = TempDir::new().unwrap();
    service(&tmp).rebuild().expect("rebuild");

    let svc = service(&tmp);
    assert!(!svc.retriever().is_loaded());
    let hits = svc.retrieve_top("payment terms", 1).expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "a.txt");
    assert!(svc.retriever().is_loaded());
}

#[test]
fn retrieve_without_index_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let svc = service(&tmp);
    let err = svc.retrieve("anything").unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }), "got {err:?}");
}

#[test]
fn rebuild_replaces_previous_index() {
    let tmp = TempDir::new().unwrap();
    let svc = service(&tmp);
    svc.rebuild().expect("rebuild");

    let corpus = svc.corpus_dir().to_path_buf();
    fs::remove_file(corpus.join("a.txt")).unwrap();
    fs::write(corpus.join("c.md"), "Warranty terms: twelve months on workmanship.").unwrap();
    let report = svc.rebuild().expect("rebuild");
    assert_eq!(report.documents, 2);

    let hits = svc.retrieve_top("payment terms warranty", 10).expect("retrieve");
    let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
    assert_eq!(hits.len(), 2);
    assert!(sources.contains(&"c.md") && !sources.contains(&"a.txt"), "{sources:?}");
}

#[test]
fn failed_rebuild_keeps_active_index() {
    let tmp = TempDir::new().unwrap();
    let svc = service(&tmp);
    svc.rebuild().expect("rebuild");
    let before = svc.retrieve("payment terms").expect("retrieve");

    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    fs::write(empty.join("notes.pdf"), "ignored").unwrap();
    let err = svc.rebuild_from(&empty).unwrap_err();
    assert!(matches!(err, Error::NoDocumentsFound { .. }), "got {err:?}");

    assert_eq!(svc.retrieve("payment terms").expect("retrieve"), before);
    svc.retriever().invalidate();
    assert_eq!(svc.retrieve("payment terms").expect("retrieve from disk"), before);
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn id(&self) -> &str {
        "failing"
    }
    fn dim(&self) -> usize {
        4
    }
    fn max_len(&self) -> usize {
        16
    }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

#[test]
fn provider_errors_propagate_and_leave_index_untouched() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("data");
    write_corpus(&corpus);
    let out = tmp.path().join("artifacts");
    let mut index = VectorIndex::new(&out);

    let err = ingest(&corpus, &DataProcessor::default(), &FailingEmbedder, &mut index).unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
    assert_eq!(err.to_string(), "embedding service unavailable");
    assert!(!out.exists());
}

#[test]
fn ingest_chunks_every_document() {
    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("data");
    fs::create_dir_all(&corpus).unwrap();
    fs::write(corpus.join("long.txt"), "x".repeat(1500)).unwrap();
    fs::write(corpus.join("short.md"), "  brief note  ").unwrap();
    let mut index = VectorIndex::new(&tmp.path().join("artifacts"));

    let report = ingest(&corpus, &DataProcessor::default(), &HashingEmbedder::new(64), &mut index).expect("ingest");
    assert_eq!(report.documents, 2);
    // 800/200 over 1500 chars: starts at 0, 600, 1200
    assert_eq!(report.chunks, 4);
    let meta = report.snapshot.metadata();
    assert_eq!(meta[0].source, "long.txt");
    assert_eq!(meta[2].chunk_id, 2);
    assert_eq!(meta[3].source, "short.md");
    assert_eq!(meta[3].text, "brief note");
    assert_eq!(meta[3].doc_id, 1);
}
