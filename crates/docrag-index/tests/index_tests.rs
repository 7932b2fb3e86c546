use std::collections::HashSet;
use std::fs;

use docrag_core::types::ChunkMeta;
use docrag_core::Error;
use docrag_index::{Generation, IndexPaths, IndexSnapshot, IndexState, VectorIndex};
use tempfile::TempDir;

fn meta(i: usize) -> ChunkMeta {
    ChunkMeta { doc_id: i / 2, source: format!("doc{}.txt", i / 2), chunk_id: i % 2, text: format!("chunk number {i}") }
}

/// `n` orthogonal unit vectors of dimension `n`.
fn basis(n: usize) -> Vec<Vec<f32>> {
    (0..n).map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect()).collect()
}

fn active(dir: &std::path::Path) -> Generation {
    IndexPaths::new(dir).active().expect("pointer").expect("saved generation")
}

fn metas(n: usize) -> Vec<ChunkMeta> {
    (0..n).map(meta).collect()
}

#[test]
fn self_query_ranks_first_with_unit_score() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    index.build(basis(4), metas(4)).expect("build");

    let query = vec![0.1, 0.2, 1.0, 0.3];
    let hits = index.search(&query, 4).expect("search");
    assert_eq!(hits[0].ordinal, 2);
    assert_eq!(hits[0].meta, meta(2));
    for w in hits.windows(2) {
        assert!(w[0].score > w[1].score, "strictly descending: {:?}", hits);
    }

    let exact = index.search(&basis(4)[1], 1).expect("search");
    assert_eq!(exact.len(), 1);
    assert!((exact[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn top_k_larger_than_index_returns_every_entry_once() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    index.build(basis(3), metas(3)).expect("build");

    let hits = index.search(&[1.0, 1.0, 1.0], 10).expect("search");
    assert_eq!(hits.len(), 3);
    let ordinals: HashSet<usize> = hits.iter().map(|h| h.ordinal).collect();
    assert_eq!(ordinals, HashSet::from([0, 1, 2]));
    // equal scores fall back to insertion order
    assert_eq!(hits.iter().map(|h| h.ordinal).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn unbounded_top_k_returns_every_entry() {
    let snapshot = IndexSnapshot::from_embeddings(basis(2), metas(2)).expect("build");
    let hits = snapshot.search(&[1.0, 0.0], usize::MAX).expect("search");
    assert_eq!(hits.iter().map(|h| h.ordinal).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn rebuild_switches_to_the_new_generation() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    index.build(basis(2), metas(2)).expect("first build");
    let first = active(tmp.path());

    let mut swapped = metas(3);
    swapped[0].text = "second build".to_string();
    index.build(basis(3), swapped).expect("second build");
    let second = active(tmp.path());
    assert_ne!(first.name, second.name);

    let mut reader = VectorIndex::new(tmp.path());
    let hits = reader.search(&basis(3)[0], 1).expect("search");
    assert_eq!(hits[0].meta.text, "second build");
    assert_eq!(reader.snapshot().expect("snapshot").len(), 3);
}

#[test]
fn unfinished_generation_is_never_read() {
    let tmp = TempDir::new().unwrap();
    VectorIndex::new(tmp.path()).build(basis(2), metas(2)).expect("build");

    // a save that died before switching the pointer
    let stray = IndexPaths::new(tmp.path()).generation("gen-99999999T999999.999999999Z");
    fs::create_dir_all(&stray.dir).unwrap();
    fs::write(&stray.vectors, b"partial").unwrap();
    fs::write(&stray.metadata, b"[]").unwrap();

    let hits = VectorIndex::new(tmp.path()).search(&[0.0, 1.0], 2).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].meta, meta(1));
}

#[test]
fn round_trip_preserves_results() {
    let tmp = TempDir::new().unwrap();
    let vectors: Vec<Vec<f32>> = (0..12)
        .map(|i| (0..8).map(|j| ((i * 7 + j * 3) % 11) as f32 - 4.0).collect())
        .collect();
    let mut built = VectorIndex::new(tmp.path());
    built.build(vectors, metas(12)).expect("build");
    let query: Vec<f32> = (0..8).map(|j| j as f32 - 3.5).collect();
    let before = built.search(&query, 5).expect("search");

    let mut fresh = VectorIndex::new(tmp.path());
    assert!(matches!(fresh.state(), IndexState::Unloaded));
    fresh.load().expect("load");
    assert!(matches!(fresh.state(), IndexState::Loaded(_)));
    let after = fresh.search(&query, 5).expect("search");

    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.ordinal, b.ordinal);
        assert_eq!(a.meta, b.meta);
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[test]
fn search_loads_lazily_from_disk() {
    let tmp = TempDir::new().unwrap();
    VectorIndex::new(tmp.path()).build(basis(2), metas(2)).expect("build");

    let mut lazy = VectorIndex::new(tmp.path());
    let hits = lazy.search(&[0.0, 1.0], 1).expect("search");
    assert_eq!(hits[0].meta, meta(1));
    assert!(matches!(lazy.state(), IndexState::Loaded(_)));
}

#[test]
fn metadata_stays_co_indexed_with_vectors() {
    let tmp = TempDir::new().unwrap();
    let n = 6;
    let mut index = VectorIndex::new(tmp.path());
    index.build(basis(n), metas(n)).expect("build");

    let mut reloaded = VectorIndex::new(tmp.path());
    for (i, v) in basis(n).iter().enumerate() {
        let hit = &reloaded.search(v, 1).expect("search")[0];
        assert_eq!(hit.ordinal, i);
        assert_eq!(hit.meta.chunk_id, meta(i).chunk_id);
        assert_eq!(hit.meta.source, meta(i).source);
    }
}

#[test]
fn empty_build_is_rejected_without_writing() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("artifacts");
    let mut index = VectorIndex::new(&dir);

    let err = index.build(Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, Error::EmptyIndex), "got {err:?}");
    assert!(!dir.exists(), "no artifacts written");
    assert!(matches!(index.state(), IndexState::Unloaded));
}

#[test]
fn inconsistent_dimensions_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    let err = index.build(vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]], metas(2)).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { position: 1, expected: 2, actual: 3 }), "got {err:?}");
}

#[test]
fn vector_and_metadata_counts_must_match() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    let err = index.build(basis(3), metas(2)).unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { vectors: 3, metadata: 2 }), "got {err:?}");
}

#[test]
fn save_before_build_is_uninitialized() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    assert!(matches!(index.save().unwrap_err(), Error::UninitializedIndex));
}

#[test]
fn staged_index_persists_on_save() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    index.stage(basis(2), metas(2)).expect("stage");
    assert!(matches!(index.state(), IndexState::Built(_)));
    assert!(!index.paths().exist());

    index.save().expect("save");
    assert!(matches!(index.state(), IndexState::Persisted(_)));
    assert!(index.paths().exist());
}

#[test]
fn missing_artifacts_report_index_not_found() {
    let tmp = TempDir::new().unwrap();
    let mut index = VectorIndex::new(tmp.path());
    assert!(matches!(index.load().unwrap_err(), Error::IndexNotFound { .. }));
    assert!(matches!(index.search(&[1.0], 1).unwrap_err(), Error::IndexNotFound { .. }));

    VectorIndex::new(tmp.path()).build(basis(2), metas(2)).expect("build");
    fs::remove_file(active(tmp.path()).metadata).unwrap();
    assert!(matches!(VectorIndex::new(tmp.path()).load().unwrap_err(), Error::IndexNotFound { .. }));
}

#[test]
fn mismatched_artifact_pair_is_detected() {
    let tmp = TempDir::new().unwrap();
    VectorIndex::new(tmp.path()).build(basis(2), metas(2)).expect("build");

    let mut edited = metas(2);
    edited[0].text = "rewritten".to_string();
    fs::write(active(tmp.path()).metadata, serde_json::to_vec_pretty(&edited).unwrap()).unwrap();

    let err = VectorIndex::new(tmp.path()).load().unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }), "got {err:?}");
}

#[test]
fn zero_vectors_do_not_poison_scores() {
    let snapshot = IndexSnapshot::from_embeddings(vec![vec![0.0, 0.0], vec![2.0, 0.0]], metas(2)).expect("build");
    assert_eq!(snapshot.vector(0), &[0.0, 0.0]);
    assert_eq!(snapshot.vector(1), &[1.0, 0.0]);

    let hits = snapshot.search(&[5.0, 0.0], 2).expect("search");
    assert_eq!(hits[0].ordinal, 1);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert_eq!(hits[1].score, 0.0);
    assert!(hits.iter().all(|h| h.score.is_finite()));
}

#[test]
fn query_dimension_must_match_index() {
    let snapshot = IndexSnapshot::from_embeddings(basis(3), metas(3)).expect("build");
    assert!(matches!(snapshot.search(&[1.0, 0.0], 1).unwrap_err(), Error::DimensionMismatch { .. }));
}

#[test]
fn metadata_file_is_a_json_array_in_ordinal_order() {
    let tmp = TempDir::new().unwrap();
    VectorIndex::new(tmp.path()).build(basis(3), metas(3)).expect("build");
    let generation = active(tmp.path());
    assert_eq!(generation.metadata.file_name().unwrap(), "metadata.json");
    assert_eq!(generation.vectors.file_name().unwrap(), "vectors.arrow");
    let raw = fs::read_to_string(&generation.metadata).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let arr = value.as_array().expect("array");
    assert_eq!(arr.len(), 3);
    assert_eq!(arr[2]["text"], "chunk number 2");
    assert_eq!(arr[2]["source"], "doc1.txt");
    assert_eq!(arr[2]["chunk_id"], 0);
    assert!(!tmp.path().join("CURRENT.tmp").exists());
}
