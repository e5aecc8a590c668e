use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Catalog missing or empty. Not retried.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Provider failure or row/dimension mismatch. Nothing is persisted.
    #[error("Embedding computation failed: {0}")]
    EmbeddingComputation(String),

    /// Durable cache could not be read or written. Always recovered locally.
    #[error("Embedding cache unavailable: {0}")]
    CachePersistence(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Catalog has {catalog} records but embedding matrix has {matrix} rows")]
    MatrixMismatch { catalog: usize, matrix: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Errors recovered locally instead of propagated to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::CachePersistence(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cache_failures_are_recoverable() {
        assert!(Error::CachePersistence("disk full".into()).is_recoverable());
        assert!(!Error::EmbeddingComputation("boom".into()).is_recoverable());
        assert!(!Error::InvalidQuery("empty".into()).is_recoverable());
    }

    #[test]
    fn mismatch_message_names_both_sizes() {
        let msg = Error::MatrixMismatch { catalog: 3, matrix: 2 }.to_string();
        assert!(msg.contains('3') && msg.contains('2'), "{msg}");
    }
}
