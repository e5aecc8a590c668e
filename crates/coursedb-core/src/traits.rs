/// Maps text to fixed-dimension vectors, one per input, in input order.
///
/// Implementations must be deterministic for a given input string; the
/// persisted embedding cache is only meaningful under that guarantee.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `minilm:all-MiniLM-L6-v2:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embedder_id(&self) -> &str {
        (**self).embedder_id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn embedder_id(&self) -> &str {
        (**self).embedder_id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// A query surface over a loaded catalog: ranked `(index, score, rank)` hits.
pub trait SearchEngine: Send + Sync {
    fn query(&self, query: &str, k: usize) -> crate::Result<Vec<crate::types::ScoredResult>>;
}
