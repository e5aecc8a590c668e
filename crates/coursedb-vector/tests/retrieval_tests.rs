mod common;

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use common::{numbered_catalog, two_course_catalog, CountingEmbedder};
use coursedb_core::traits::{Embedder, SearchEngine};
use coursedb_core::types::{Catalog, CourseRecord, EmbeddingMatrix};
use coursedb_core::Error;
use coursedb_embed::FakeEmbedder;
use coursedb_vector::{CourseIndex, EmbeddingStore, RetrievalEngine, DEFAULT_TOP_K};

fn matrix_for(catalog: &Catalog) -> EmbeddingMatrix {
    let embedder = FakeEmbedder::default();
    EmbeddingMatrix::try_new(embedder.dim(), embedder.embed_batch(&catalog.embedding_texts()).unwrap()).unwrap()
}

#[test]
fn beginner_ml_query_prefers_intro_course() {
    let catalog = two_course_catalog();
    let matrix = matrix_for(&catalog);
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));

    let hits = engine.search("beginner machine learning", &catalog, &matrix, DEFAULT_TOP_K).unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].index, 0);
    assert_eq!(hits[1].index, 1);
    assert!(hits[0].score > hits[1].score);
    assert_eq!((hits[0].rank, hits[1].rank), (1, 2));
}

#[test]
fn empty_query_is_rejected_before_provider_and_cache() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(CountingEmbedder::new());
    let store = EmbeddingStore::new(embedder.clone(), tmp.path().join("cache.json"));
    let catalog = Arc::new(two_course_catalog());
    let (index, _) = CourseIndex::open(catalog, &store).unwrap();
    let calls_after_build = embedder.calls();
    let cache_before = fs::read(store.cache_path()).unwrap();

    for query in ["", "   ", "\n\t"] {
        let err = index.search(query, 5).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)), "{query:?} -> {err}");
    }

    assert_eq!(embedder.calls(), calls_after_build, "no provider call for invalid queries");
    assert_eq!(fs::read(store.cache_path()).unwrap(), cache_before);
}

#[test]
fn zero_top_k_is_invalid() {
    let catalog = two_course_catalog();
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let err = engine.search("web", &catalog, &matrix_for(&catalog), 0).unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[test]
fn top_k_is_clamped_to_catalog_size() {
    let catalog = numbered_catalog(3);
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let hits = engine.search("topic 1", &catalog, &matrix_for(&catalog), 50).unwrap();
    assert_eq!(hits.len(), 3);

    let big = numbered_catalog(15);
    let hits = engine.search("topic 1", &big, &matrix_for(&big), DEFAULT_TOP_K).unwrap();
    assert_eq!(hits.len(), 10);
}

#[test]
fn scores_are_bounded_and_non_increasing() {
    let catalog = numbered_catalog(25);
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let hits = engine.search("Course lesson topic 2", &catalog, &matrix_for(&catalog), 25).unwrap();

    assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    let mut seen: Vec<usize> = hits.iter().map(|h| h.index).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..25).collect::<Vec<_>>(), "every record ranked exactly once");
}

#[test]
fn identical_records_keep_catalog_order() {
    let dup = CourseRecord::new("Data Science", "statistics with python");
    let catalog = Catalog::new(vec![
        CourseRecord::new("Cooking", "knife skills"),
        dup.clone(),
        CourseRecord::new("Gardening", "soil and seeds"),
        dup.clone(),
        dup,
    ]);
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let hits = engine.search("statistics with python", &catalog, &matrix_for(&catalog), 3).unwrap();

    let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
    assert_eq!(order, vec![1, 3, 4]);
    assert_eq!(hits[0].score, hits[2].score);
}

#[test]
fn empty_catalog_or_matrix_yields_no_results() {
    let embedder = Arc::new(CountingEmbedder::new());
    let engine = RetrievalEngine::new(embedder.clone());
    let empty_matrix = EmbeddingMatrix::try_new(384, Vec::new()).unwrap();

    assert!(engine.search("python", &Catalog::default(), &empty_matrix, 5).unwrap().is_empty());
    assert!(engine.search("python", &two_course_catalog(), &empty_matrix, 5).unwrap().is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn misaligned_catalog_and_matrix_is_an_error() {
    let catalog = numbered_catalog(3);
    let matrix = matrix_for(&numbered_catalog(2));
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let err = engine.search("topic", &catalog, &matrix, 5).unwrap_err();
    assert!(matches!(err, Error::MatrixMismatch { catalog: 3, matrix: 2 }));
}

#[test]
fn query_dimension_must_match_matrix() {
    let catalog = two_course_catalog();
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::new(16)));
    let err = engine.search("web", &catalog, &matrix_for(&catalog), 5).unwrap_err();
    assert!(matches!(err, Error::EmbeddingComputation(_)));
}

#[test]
fn search_is_repeatable() {
    let catalog = numbered_catalog(8);
    let matrix = matrix_for(&catalog);
    let engine = RetrievalEngine::new(Arc::new(FakeEmbedder::default()));
    let a = engine.search("lesson 3", &catalog, &matrix, 4).unwrap();
    let b = engine.search("  lesson 3  ", &catalog, &matrix, 4).unwrap();
    assert_eq!(a, b);
}

#[test]
fn course_index_joins_hits_with_records() {
    let tmp = TempDir::new().unwrap();
    let store = EmbeddingStore::new(Arc::new(FakeEmbedder::default()), tmp.path().join("cache.json"));
    let (index, report) = CourseIndex::open(Arc::new(two_course_catalog()), &store).unwrap();
    assert_eq!(report.matrix.len(), 2);

    let hits = index.search("practical projects for experienced developers", 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1.title, "Advanced Web");

    let ranked = index.query("practical projects for experienced developers", 5).unwrap();
    assert_eq!(ranked[0].index, 1);
}

#[test]
fn searches_after_open_embed_only_the_query() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(CountingEmbedder::new());
    let store = EmbeddingStore::new(embedder.clone(), tmp.path().join("cache.json"));
    let (index, _) = CourseIndex::open(Arc::new(numbered_catalog(12)), &store).unwrap();
    assert_eq!(embedder.calls(), 1);
    let cache_before = fs::read(store.cache_path()).unwrap();

    let queries = ["topic 1", "lesson 7", "course about topic 3"];
    for query in queries {
        assert!(!index.search(query, 3).unwrap().is_empty());
    }

    assert_eq!(embedder.calls(), 1 + queries.len());
    assert_eq!(fs::read(store.cache_path()).unwrap(), cache_before);
}
