use thiserror::Error;

/// An error that happens when reading or writing a [`CacheStore`](super::CacheStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No schedule is stored for the requested key.
    #[error("not found")]
    NotFound,
    /// A schedule was stored, but could not be read back.
    ///
    /// The attached string contains the parser's error message.
    #[error("malformed: {0}")]
    Malformed(String),
    /// An unexpected error in the store itself, like a failing file-system operation.
    ///
    /// The underlying error is logged when this is created.
    #[error("internal error")]
    InternalError,
}

impl From<std::io::Error> for StoreError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        Self::from_std_error(err)
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::from_std_error(err)
    }
}

impl StoreError {
    #[track_caller]
    pub fn from_std_error<E: std::error::Error + 'static>(e: E) -> Self {
        let dynerr: &dyn std::error::Error = &e; // tracing expects a `&dyn Error`
        tracing::error!(error = dynerr);
        Self::InternalError
    }

    /// A short, stable name for this error, usable as a metrics tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound => "not-found",
            StoreError::Malformed(_) => "malformed",
            StoreError::InternalError => "internal",
        }
    }
}
