//! The interface to whatever actually retrieves program schedules.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::types::{Schedule, TaskKey};

/// An error that happens while fetching a schedule from its remote source.
///
/// This is [`Clone`], as one failed fetch is reported to every caller that waited for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote source has no schedule for this station and date.
    #[error("not found")]
    NotFound,
    /// The schedule could not be retrieved due to connection loss, DNS resolution, or an
    /// unexpected server response.
    ///
    /// The attached string contains a description of the failure.
    #[error("network error: {0}")]
    Network(String),
    /// The schedule was retrieved, but could not be parsed.
    #[error("malformed: {0}")]
    Malformed(String),
    /// The fetch did not complete within the configured timeout.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The fetch was torn down before it produced a result, e.g. because it panicked or the
    /// runtime shut down.
    #[error("fetch aborted")]
    Aborted,
}

impl FetchError {
    /// A short, stable name for this error, usable as a metrics tag.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound => "not-found",
            FetchError::Network(_) => "network",
            FetchError::Malformed(_) => "malformed",
            FetchError::Timeout(_) => "timeout",
            FetchError::Aborted => "aborted",
        }
    }
}

/// Retrieves the schedule for a [`TaskKey`] from its remote source.
///
/// Fetching is expected to be slow and may fail. The coordinator guarantees that at most one
/// fetch per key runs at any time.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch<'a>(&'a self, key: &'a TaskKey) -> BoxFuture<'a, Result<Schedule, FetchError>>;
}
