//! Types shared between the coordinator, the fetchers and the cache stores.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Identifies one unit of fetchable work: the schedule of one station on one date.
///
/// Equality and hashing are structural, two keys with the same station and date are the
/// same key. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    station: Arc<str>,
    date: Arc<str>,
}

impl TaskKey {
    /// Creates a key for `station` on `date` (formatted as `yyyy-MM-dd`).
    pub fn new(station: impl Into<Arc<str>>, date: impl Into<Arc<str>>) -> Self {
        Self {
            station: station.into(),
            date: date.into(),
        }
    }

    /// The station identifier, e.g. `CCTV1`.
    pub fn station(&self) -> &str {
        &self.station
    }

    /// The date string, e.g. `2024-01-01`.
    pub fn date(&self) -> &str {
        &self.date
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.station, self.date)
    }
}

/// A single program on a station's schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    /// The station broadcasting this program.
    pub station: String,
    /// The program title.
    pub program: String,
    /// The date the program airs on.
    pub air_date: NaiveDate,
    /// The local start time.
    pub air_time: NaiveTime,
    /// The weekday index, `1` being Monday.
    pub week_index: u8,
}

/// The ordered program entries for one [`TaskKey`].
pub type Schedule = Arc<[ProgramEntry]>;
