use thiserror::Error;

/// Errors surfaced by the aggregator, the scoring engine and their loaders.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed walking capture directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("dimension mismatch for {entity}: state has {expected} features, observation has {actual}")]
    DimensionMismatch {
        entity: String,
        expected: usize,
        actual: usize,
    },

    #[error("non-finite timestamp {timestamp} for {entity}")]
    InvalidTimestamp { entity: String, timestamp: f64 },

    #[error("decay constant must be positive and finite, got {0}")]
    InvalidDecayConstant(f64),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
