use thiserror::Error;

/// Errors that can occur in a triple store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error stemming from a store implementation, which might be
    /// specific to that backend or to a certain operation.
    #[error("store error: {context}")]
    Backend {
        /// Describes the operation that failed.
        context: String,
        /// The underlying cause.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wraps an implementation-specific error with context.
    pub fn backend(
        context: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            cause: Box::new(cause),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
