use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveTime};
use epg_service::config::Config;
use epg_service::fetch::{FetchError, Fetcher};
use epg_service::services::EpgServices;
use epg_service::types::{ProgramEntry, Schedule, TaskKey};
use epg_test as test;
use futures::future::BoxFuture;

/// A fetcher serving a fixed lineup for every station, after a short delay.
///
/// Dates that do not parse as `yyyy-MM-dd` are reported as malformed.
#[derive(Debug, Default)]
pub struct LineupFetcher {
    calls: AtomicUsize,
}

impl LineupFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for LineupFetcher {
    fn fetch<'a>(&'a self, key: &'a TaskKey) -> BoxFuture<'a, Result<Schedule, FetchError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let air_date = NaiveDate::parse_from_str(key.date(), "%Y-%m-%d")
                .map_err(|err| FetchError::Malformed(err.to_string()))?;
            Ok(lineup(key.station(), air_date))
        })
    }
}

/// The lineup served by [`LineupFetcher`].
pub fn lineup(station: &str, air_date: NaiveDate) -> Schedule {
    [(6, "Morning News"), (12, "Noon Report"), (19, "Evening Drama")]
        .into_iter()
        .map(|(hour, program)| ProgramEntry {
            station: station.to_owned(),
            program: program.to_owned(),
            air_date,
            air_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            week_index: air_date.weekday().number_from_monday() as u8,
        })
        .collect()
}

/// Setup tests and create a service backed by a [`LineupFetcher`].
///
/// The service persists schedules into the returned temporary directory. The directory is cleaned
/// up when the [`TempDir`](test::TempDir) instance is dropped. Keep it as guard until the test has
/// finished.
pub fn setup_service(
    update_config: impl FnOnce(&mut Config),
) -> (EpgServices, Arc<LineupFetcher>, test::TempDir) {
    test::setup();

    let cache_dir = test::tempdir();
    let mut config = Config {
        cache_dir: Some(cache_dir.path().to_owned()),
        ..Default::default()
    };
    update_config(&mut config);

    let fetcher = Arc::new(LineupFetcher::default());
    let handle = tokio::runtime::Handle::current();
    let services = EpgServices::new(config, fetcher.clone(), handle).unwrap();

    (services, fetcher, cache_dir)
}
