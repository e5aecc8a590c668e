#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use coursedb_core::traits::Embedder;
use coursedb_core::types::{Catalog, CourseRecord};
use coursedb_embed::FakeEmbedder;

/// FakeEmbedder that counts provider calls.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self { inner: FakeEmbedder::default(), calls: AtomicUsize::new(0), delay: None }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::new() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        self.inner.embed_batch(texts)
    }
}

/// Drops the last vector of every batch.
pub struct ShortEmbedder(pub FakeEmbedder);

impl Embedder for ShortEmbedder {
    fn embedder_id(&self) -> &str {
        self.0.embedder_id()
    }

    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = self.0.embed_batch(texts)?;
        out.pop();
        Ok(out)
    }
}

/// Always fails, like a model that cannot run.
pub struct FailingEmbedder(pub FakeEmbedder);

impl Embedder for FailingEmbedder {
    fn embedder_id(&self) -> &str {
        self.0.embedder_id()
    }

    fn dim(&self) -> usize {
        self.0.dim()
    }

    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("model weights unavailable")
    }
}

pub fn two_course_catalog() -> Catalog {
    Catalog::new(vec![
        CourseRecord::new("Intro to ML", "beginner friendly machine learning basics"),
        CourseRecord::new("Advanced Web", "practical projects for experienced developers"),
    ])
}

pub fn numbered_catalog(n: usize) -> Catalog {
    Catalog::new(
        (0..n)
            .map(|i| CourseRecord::new(format!("Course {}", i), format!("topic {} lesson {}", i % 4, i)))
            .collect(),
    )
}
