//! # Schedule cache stores
//!
//! The [`TaskCoordinator`](crate::coordinator::TaskCoordinator) never talks to a database
//! directly. It consults a [`CacheStore`] before starting a fetch, and publishes the fetched
//! [`Schedule`] into the same store before it releases the callers that waited for it.
//!
//! Two stores ship with the service:
//!
//! - [`MemoryCacheStore`]: a bounded in-memory cache, used when no `cache_dir` is configured.
//! - [`FsCacheStore`]: one JSON file per [`TaskKey`] underneath `cache_dir`. Files are written to
//!   a temporary file first and then atomically renamed into place, so a concurrent reader either
//!   sees the complete schedule or nothing at all.
//!
//! ## [`StoreError`]
//!
//! Reading a key that does not exist yields [`StoreError::NotFound`]. Files that exist but cannot
//! be parsed are [`StoreError::Malformed`]. Everything else, such as I/O failures, is logged at
//! the point of conversion and collapsed into [`StoreError::InternalError`].
//!
//! ## [`StorePath`]
//!
//! The file-system layout is derived from a SHA-256 hash over stable, human-readable metadata
//! describing the key. Care must be taken to keep that metadata stable, as it would otherwise
//! orphan all existing cache files.

use crate::types::{Schedule, TaskKey};

mod fs;
mod memory;
mod store_error;
mod store_path;

pub use fs::FsCacheStore;
pub use memory::MemoryCacheStore;
pub use store_error::StoreError;
pub use store_path::StorePath;

/// Durable lookup of fetched schedules.
///
/// Implementations are externally synchronized: each call is atomic from the point of view of
/// the coordinator, and a successful [`put`](Self::put) is visible to every subsequent
/// [`has`](Self::has) and [`get`](Self::get).
pub trait CacheStore: Send + Sync + 'static {
    /// Returns `true` if a schedule for `key` is stored.
    fn has(&self, key: &TaskKey) -> bool;

    /// Loads the schedule for `key`.
    ///
    /// Fails with [`StoreError::NotFound`] if nothing is stored for `key`.
    fn get(&self, key: &TaskKey) -> Result<Schedule, StoreError>;

    /// Stores `schedule` for `key`, replacing any previous value.
    fn put(&self, key: &TaskKey, schedule: &Schedule) -> Result<(), StoreError>;

    /// Returns `true` if calls into this store may block the current thread on I/O.
    ///
    /// The coordinator moves calls into blocking stores off the async runtime.
    fn is_blocking(&self) -> bool {
        true
    }

    /// Loads the schedule for `key` if one is stored.
    ///
    /// The default implementation checks [`has`](Self::has) before calling [`get`](Self::get).
    fn lookup(&self, key: &TaskKey) -> Result<Option<Schedule>, StoreError> {
        if !self.has(key) {
            return Ok(None);
        }
        match self.get(key) {
            Ok(schedule) => Ok(Some(schedule)),
            // lost a race against an eviction
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
