use thiserror::Error;

/// Errors surfaced by store and service clients.
///
/// Adapters convert these into `RetrievalOutcome::Unavailable` at their
/// boundary; only the store/client layer itself deals in typed errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response from {endpoint}: {detail}")]
    Malformed { endpoint: String, detail: String },

    #[error("collection not found: {0}")]
    MissingCollection(String),
}

impl StoreError {
    pub fn unavailable(detail: impl std::fmt::Display) -> Self {
        Self::Unavailable(detail.to_string())
    }
}
