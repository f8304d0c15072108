use std::fmt::{self, Write};

use sha2::{Digest, Sha256};

use crate::types::TaskKey;

/// The version of the on-disk schedule format.
///
/// Bumping this moves all schedules into a fresh directory.
pub const STORE_VERSION: u32 = 1;

/// The location of a [`TaskKey`] in the file-system store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    metadata: String,
    hash: [u8; 32],
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path(STORE_VERSION))
    }
}

impl StorePath {
    /// Creates the [`StorePath`] for `key`.
    pub fn for_key(key: &TaskKey) -> Self {
        let metadata = format!("station: {}\ndate: {}\n", key.station(), key.date());
        let hash = Sha256::digest(&metadata).into();
        Self { metadata, hash }
    }

    /// Returns the human-readable metadata that forms the basis of the hash.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Returns the relative path for this key.
    ///
    /// The relative path is a sha-256 hash hex-formatted like so:
    /// `v$version/aa/bbccdd/eeff...`
    pub fn relative_path(&self, version: u32) -> String {
        let mut path = format!("v{version}/{:02x}/", self.hash[0]);
        for b in &self.hash[1..4] {
            let _ = write!(path, "{b:02x}");
        }
        path.push('/');
        for b in &self.hash[4..] {
            let _ = write!(path, "{b:02x}");
        }
        path
    }
}
