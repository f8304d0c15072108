use moka::sync::Cache;

use crate::types::{Schedule, TaskKey};

use super::{CacheStore, StoreError};

/// A bounded, in-memory [`CacheStore`].
///
/// Capacity is counted in program entries rather than schedules, so a station with a dense
/// schedule weighs more than one with only a handful of programs.
#[derive(Clone)]
pub struct MemoryCacheStore {
    schedules: Cache<TaskKey, Schedule>,
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("schedules", &self.schedules.entry_count())
            .field("weighted_size", &self.schedules.weighted_size())
            .finish()
    }
}

impl MemoryCacheStore {
    /// Creates a store holding roughly `capacity` schedules of average size.
    ///
    /// A `capacity` of zero is treated as one.
    pub fn new(capacity: u64) -> Self {
        // NOTE: a daily schedule has around 50 entries
        let schedules = Cache::builder()
            .max_capacity(capacity.max(1).saturating_mul(50))
            .name("schedules")
            .weigher(|_key, schedule: &Schedule| {
                u32::try_from(schedule.len()).unwrap_or(u32::MAX).max(1)
            })
            .build();
        Self { schedules }
    }
}

impl CacheStore for MemoryCacheStore {
    fn has(&self, key: &TaskKey) -> bool {
        self.schedules.contains_key(key)
    }

    fn get(&self, key: &TaskKey) -> Result<Schedule, StoreError> {
        self.schedules.get(key).ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &TaskKey, schedule: &Schedule) -> Result<(), StoreError> {
        self.schedules.insert(key.clone(), schedule.clone());
        Ok(())
    }

    fn is_blocking(&self) -> bool {
        false
    }
}
