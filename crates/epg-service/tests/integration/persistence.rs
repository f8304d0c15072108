use std::sync::Arc;

use chrono::NaiveDate;
use epg_service::config::Config;
use epg_service::services::EpgServices;
use epg_service::types::TaskKey;
use epg_test as test;

use crate::{LineupFetcher, lineup, setup_service};

#[tokio::test]
async fn test_schedules_survive_restart() {
    let (services, fetcher, cache_dir) = setup_service(|_| {});
    let key = TaskKey::new("CCTV1", "2024-01-01");

    services.resolve(key.clone()).await.unwrap();
    assert_eq!(fetcher.calls(), 1);
    drop(services);

    let config = Config {
        cache_dir: Some(cache_dir.path().to_owned()),
        ..Default::default()
    };
    let fetcher = Arc::new(LineupFetcher::default());
    let handle = tokio::runtime::Handle::current();
    let services = EpgServices::new(config, fetcher.clone(), handle).unwrap();

    let schedule = services.resolve(key).await.unwrap();
    assert_eq!(
        schedule,
        lineup("CCTV1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    );
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_in_memory_store_is_not_shared() {
    test::setup();

    let key = TaskKey::new("CCTV2", "2024-01-01");
    let mut total_calls = 0;

    for _ in 0..2 {
        let fetcher = Arc::new(LineupFetcher::default());
        let handle = tokio::runtime::Handle::current();
        let services = EpgServices::new(Config::default(), fetcher.clone(), handle).unwrap();

        services.resolve(key.clone()).await.unwrap();
        services.resolve(key.clone()).await.unwrap();
        total_calls += fetcher.calls();
    }

    assert_eq!(total_calls, 2);
}
