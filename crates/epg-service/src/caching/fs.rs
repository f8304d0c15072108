use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::types::{ProgramEntry, Schedule, TaskKey};

use super::store_path::STORE_VERSION;
use super::{CacheStore, StoreError, StorePath};

/// The on-disk representation of a stored schedule.
///
/// The key is stored alongside the entries to make the files self-describing.
#[derive(Serialize)]
struct StoredScheduleRef<'a> {
    key: &'a TaskKey,
    entries: &'a [ProgramEntry],
}

#[derive(Deserialize)]
struct StoredSchedule {
    key: TaskKey,
    entries: Schedule,
}

/// A [`CacheStore`] persisting one JSON file per key on the file system.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    cache_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl FsCacheStore {
    /// Opens the store rooted at `cache_dir`.
    ///
    /// This creates the directory if needed and clears temporary files left over from a
    /// previous run.
    pub fn open(cache_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let cache_dir = cache_dir.into();
        let tmp_dir = cache_dir.join("tmp");

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        Ok(Self { cache_dir, tmp_dir })
    }

    /// The root directory of this store.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &TaskKey) -> PathBuf {
        self.cache_dir
            .join(StorePath::for_key(key).relative_path(STORE_VERSION))
    }

    fn tempfile(&self) -> io::Result<NamedTempFile> {
        // The tmp directory could have been removed underneath us.
        fs::create_dir_all(&self.tmp_dir)?;
        tempfile::Builder::new()
            .prefix("tmp")
            .tempfile_in(&self.tmp_dir)
    }
}

impl CacheStore for FsCacheStore {
    fn has(&self, key: &TaskKey) -> bool {
        self.cache_path(key).is_file()
    }

    fn get(&self, key: &TaskKey) -> Result<Schedule, StoreError> {
        let path = self.cache_path(key);
        tracing::trace!("Loading schedule {} at path {}", key, path.display());

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSchedule = serde_json::from_slice(&data).map_err(|e| {
            tracing::warn!(
                error = &e as &dyn std::error::Error,
                path = %path.display(),
                "Failed to parse stored schedule",
            );
            StoreError::Malformed(e.to_string())
        })?;

        if stored.key != *key {
            return Err(StoreError::Malformed(format!(
                "expected schedule for {key}, found {}",
                stored.key
            )));
        }

        Ok(stored.entries)
    }

    fn put(&self, key: &TaskKey, schedule: &Schedule) -> Result<(), StoreError> {
        let path = self.cache_path(key);
        tracing::trace!("Storing schedule {} at path {}", key, path.display());

        let mut temp_file = self.tempfile()?;
        let stored = StoredScheduleRef {
            key,
            entries: schedule,
        };
        serde_json::to_writer(temp_file.as_file_mut(), &stored)?;
        temp_file.as_file().sync_data()?;

        persist_tempfile(temp_file, &path)?;
        Ok(())
    }
}

fn persist_tempfile(mut temp_file: NamedTempFile, cache_path: &Path) -> io::Result<fs::File> {
    let parent = cache_path
        .parent()
        .ok_or_else(|| io::Error::other("no parent directory to persist item"))?;

    // Directories could be removed concurrently by an outside cleanup, so retry the fs
    // operations a few times.
    const MAX_RETRIES: usize = 2;
    let mut retries = 0;
    let file = loop {
        retries += 1;

        if let Err(e) = fs::create_dir_all(parent) {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                path = %parent.display(),
                "Failed to create cache directory",
            );
            if retries > MAX_RETRIES {
                return Err(e);
            }
            continue;
        }

        match temp_file.persist(cache_path) {
            Ok(file) => break file,
            Err(e) => {
                temp_file = e.file;
                let err = e.error;
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    path = %cache_path.display(),
                    "Failed to create cache file",
                );
                if retries > MAX_RETRIES {
                    return Err(err);
                }
                continue;
            }
        }
    };
    Ok(file)
}
