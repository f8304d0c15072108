use chrono::NaiveDate;
use epg_service::coordinator::ResolveError;
use epg_service::fetch::FetchError;
use epg_service::types::TaskKey;

use crate::{lineup, setup_service};

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let (services, fetcher, _cache_dir) = setup_service(|_| {});
    let key = TaskKey::new("CCTV1", "2024-01-01");

    let requests = (0..5).map(|_| {
        let services = services.clone();
        let key = key.clone();
        tokio::spawn(async move { services.resolve(key).await })
    });
    let results = futures::future::join_all(requests).await;

    let expected = lineup("CCTV1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    for result in results {
        assert_eq!(result.unwrap().unwrap(), expected);
    }
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(services.coordinator().in_flight(), 0);

    let cached = services.resolve(key).await.unwrap();
    assert_eq!(cached, expected);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_every_key_is_fetched_once() {
    let (services, fetcher, _cache_dir) = setup_service(|config| {
        config.worker_pool.size = Some(2);
    });

    let keys: Vec<_> = ["CCTV1", "CCTV2", "CCTV5"]
        .into_iter()
        .flat_map(|station| {
            ["2024-01-01", "2024-01-02"]
                .into_iter()
                .map(move |date| TaskKey::new(station, date))
        })
        .collect();

    // every key is requested three times at once
    let requests = keys.iter().cycle().take(keys.len() * 3).map(|key| {
        let services = services.clone();
        let key = key.clone();
        tokio::spawn(async move { services.resolve(key).await })
    });
    for result in futures::future::join_all(requests).await {
        result.unwrap().unwrap();
    }

    assert_eq!(fetcher.calls(), keys.len());

    let schedule = services
        .resolve(TaskKey::new("CCTV5", "2024-01-02"))
        .await
        .unwrap();
    assert!(schedule.iter().all(|entry| entry.station == "CCTV5"));
    assert!(schedule.iter().all(|entry| entry.week_index == 2));
}

#[tokio::test]
async fn test_malformed_schedule_is_not_cached() {
    let (services, fetcher, _cache_dir) = setup_service(|_| {});
    let key = TaskKey::new("CCTV1", "next monday");

    for _ in 0..2 {
        let err = services.resolve(key.clone()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Fetch(FetchError::Malformed(_))));
    }
    assert_eq!(fetcher.calls(), 2);
}
