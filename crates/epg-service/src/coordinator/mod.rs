//! Request-deduplicating resolution of program schedules.
//!
//! The [`TaskCoordinator`] answers "give me the schedule of this station on this date". It
//! serves the answer from the [`CacheStore`] if it can, and otherwise makes sure that no matter
//! how many callers ask for the same [`TaskKey`] at the same time, the [`Fetcher`] is invoked
//! only once.
//!
//! A resolution goes through the following steps:
//!
//! - The cache store is consulted. A hit is returned right away.
//! - The key is entered into the [`InFlightRegistry`]. The first caller becomes the *owner* of
//!   the key, all others become *followers*.
//! - The owner dispatches a job onto the [`WorkerPool`]. The job checks the cache store once more,
//!   fetches the schedule, writes it to the cache store, removes the key from the registry and
//!   only then wakes everyone waiting on the key.
//! - The owner returns the fetched schedule. Followers re-read the cache store.
//!
//! A failed fetch is reported to the owner and all of its followers, and is not cached, so the
//! next resolution of the same key starts a fresh fetch.
//!
//! Calls into a [`CacheStore`] that [may block](CacheStore::is_blocking) run on tokio's blocking
//! thread pool.
//!
//! Waiting can be cancelled through a [`CancellationToken`]. Cancelling (or dropping) a waiting
//! owner does not cancel its job, which will still complete and release its followers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::caching::{CacheStore, StoreError};
use crate::fetch::{FetchError, Fetcher};
use crate::pool::WorkerPool;
use crate::types::{Schedule, TaskKey};

mod registry;

pub use registry::{Completion, Flight, InFlightRegistry, OwnerTicket};

/// What a completed flight reports to its waiters.
pub type FlightOutcome = Result<Schedule, FetchError>;

/// Errors returned by [`TaskCoordinator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Fetching the schedule failed.
    #[error("failed to fetch schedule: {0}")]
    Fetch(#[from] FetchError),
    /// The caller stopped waiting for the schedule.
    #[error("resolution was cancelled")]
    Cancelled,
    /// A fetch for the key completed, yet the cache store has no schedule for it.
    #[error("schedule for {0} missing from the cache store after fetching it")]
    NotFound(TaskKey),
    /// The cache store could not be read.
    #[error("failed to read cache store: {0}")]
    Store(#[from] StoreError),
}

/// Resolves [`Schedule`]s, deduplicating concurrent fetches for the same [`TaskKey`].
///
/// Cloning a coordinator is cheap, all clones share the same registry and pool.
#[derive(Clone)]
pub struct TaskCoordinator {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    flights: InFlightRegistry<TaskKey, FlightOutcome>,
    pool: WorkerPool,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for TaskCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCoordinator")
            .field("flights", &self.flights)
            .field("pool", &self.pool)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl TaskCoordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        pool: WorkerPool,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            flights: InFlightRegistry::new(),
            pool,
            fetch_timeout,
        }
    }

    /// The number of keys that currently have a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Returns `true` if a fetch for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &TaskKey) -> bool {
        self.flights.contains(key)
    }

    /// Resolves the schedule for `key`.
    ///
    /// See [`resolve_cancellable`](Self::resolve_cancellable).
    pub async fn resolve(&self, key: TaskKey) -> Result<Schedule, ResolveError> {
        self.resolve_cancellable(key, &CancellationToken::new()).await
    }

    /// Resolves the schedule for `key`, giving up once `cancel` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Fetch`] if the fetch for `key` failed, both for the owner and for all
    ///   followers of that fetch.
    /// - [`ResolveError::Cancelled`] if `cancel` fired while waiting.
    /// - [`ResolveError::NotFound`] if a follower found nothing in the cache store after a
    ///   successful fetch.
    /// - [`ResolveError::Store`] if the cache store failed.
    pub async fn resolve_cancellable(
        &self,
        key: TaskKey,
        cancel: &CancellationToken,
    ) -> Result<Schedule, ResolveError> {
        metric!(counter("resolve.access") += 1);
        tracing::debug!(%key, "Resolving schedule");

        if let Some(schedule) = lookup(&self.store, &key).await? {
            metric!(counter("resolve.cache.hit") += 1);
            return Ok(schedule);
        }

        match self.flights.enter(key.clone()) {
            Flight::Owner { ticket, completion } => {
                metric!(counter("inflight.owner") += 1);
                tracing::debug!(%key, "Fetching schedule");
                self.dispatch(key, ticket);

                Ok(wait_for(completion, cancel).await??)
            }
            Flight::Follower(completion) => {
                metric!(counter("inflight.follower") += 1);
                tracing::debug!(%key, "Waiting for the in-flight fetch of the same schedule");

                wait_for(completion, cancel).await??;

                tracing::debug!(%key, "In-flight fetch finished, reading schedule from cache store");
                lookup(&self.store, &key)
                    .await?
                    .ok_or(ResolveError::NotFound(key))
            }
        }
    }

    /// Spawns the fetch for `key` onto the worker pool.
    ///
    /// The job publishes the fetched schedule to the cache store before completing `ticket`.
    fn dispatch(&self, key: TaskKey, ticket: OwnerTicket<FlightOutcome>) {
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let fetch_timeout = self.fetch_timeout;

        let job = async move {
            // The previous flight might have published the schedule between the owner's lookup
            // and this flight taking over.
            match lookup(&store, &key).await {
                Ok(Some(schedule)) => {
                    metric!(counter("resolve.cache.hit") += 1);
                    tracing::debug!(%key, "Schedule was stored in the meantime, skipping fetch");
                    ticket.complete(Ok(schedule));
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        error = &err as &dyn std::error::Error,
                        %key,
                        "Failed to re-check cache store, fetching anyway",
                    );
                }
            }

            let start = Instant::now();
            let outcome = match tokio::time::timeout(fetch_timeout, fetcher.fetch(&key)).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => Err(FetchError::Timeout(fetch_timeout)),
            };

            match &outcome {
                Ok(schedule) => {
                    metric!(timer("fetch.duration") = start.elapsed(), "status" => "ok");
                    let put = {
                        let key = key.clone();
                        let schedule = Arc::clone(schedule);
                        move |store: &dyn CacheStore| store.put(&key, &schedule)
                    };
                    if let Err(err) = with_store(&store, put).await {
                        metric!(counter("store.put.error") += 1, "kind" => err.kind());
                        tracing::error!(
                            error = &err as &dyn std::error::Error,
                            %key,
                            "Failed to store fetched schedule",
                        );
                    }
                }
                Err(err) => {
                    metric!(timer("fetch.duration") = start.elapsed(), "status" => "error");
                    metric!(counter("fetch.error") += 1, "kind" => err.kind());
                    tracing::warn!(
                        error = err as &dyn std::error::Error,
                        %key,
                        "Failed to fetch schedule",
                    );
                }
            }

            tracing::debug!(%key, "Fetch finished, notifying waiters");
            ticket.complete(outcome);
        };

        metric!(gauge("inflight.count") = self.flights.len() as u64);
        // The job is detached, it completes and wakes all waiters even if the owner goes away.
        let _not_awaiting_job = self.pool.spawn(job);
    }
}

/// Looks up `key` in `store`.
async fn lookup(
    store: &Arc<dyn CacheStore>,
    key: &TaskKey,
) -> Result<Option<Schedule>, StoreError> {
    let key = key.clone();
    with_store(store, move |store| store.lookup(&key)).await
}

/// Runs `op` against `store`, moving it onto the blocking thread pool if the store may block.
async fn with_store<R, F>(store: &Arc<dyn CacheStore>, op: F) -> Result<R, StoreError>
where
    F: FnOnce(&dyn CacheStore) -> Result<R, StoreError> + Send + 'static,
    R: Send + 'static,
{
    if !store.is_blocking() {
        return op(store.as_ref());
    }

    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(StoreError::from_std_error)?
}

/// Waits for `completion`, unless `cancel` fires first.
///
/// An abandoned flight is reported as [`FetchError::Aborted`].
async fn wait_for(
    completion: Completion<FlightOutcome>,
    cancel: &CancellationToken,
) -> Result<FlightOutcome, ResolveError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        outcome = completion.wait() => Ok(outcome.unwrap_or(Err(FetchError::Aborted))),
    }
}
