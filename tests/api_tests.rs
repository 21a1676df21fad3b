//! HTTP API of a single daemon
use std::sync::Arc;

use meridian::api::hits::{ExpireKeysResponse, RegionsResponse, RemoteHitsResponse};
use meridian::api::{paths, AboutResponse};
use meridian::daemon::Daemon;
use meridian::hits::{RegionHit, RegionHitsRequest, RegionHitsResponse};
use meridian::region::{PeerInfo, RegionName};
use meridian::settings::Settings;
use reqwest::StatusCode;
use tokio::net::TcpStream;
use tokio::time::{self, Duration, Instant};

async fn spawn_daemon() -> Daemon {
    let settings = Settings {
        listen_address: "127.0.0.1".to_string(),
        listen_port: 0,
        region: "west".into(),
        regions: vec![PeerInfo::new("http://127.0.0.1:1", "east")],
        ..Default::default()
    };
    Daemon::spawn(settings).await.expect("Should start daemon")
}

fn region_hits(source: &str, hits: &[(&str, i64)]) -> RegionHitsRequest {
    RegionHitsRequest {
        source_region: source.into(),
        hits: hits
            .iter()
            .map(|(key, hits)| RegionHit {
                name: "rule".to_string(),
                unique_key: key.to_string(),
                hits: *hits,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_base_endpoints() {
    let mut daemon = spawn_daemon().await;
    let base = daemon.address();

    let health = reqwest::get(format!("{}{}", base, paths::base::HEALTH))
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");

    let about: AboutResponse = reqwest::get(format!("{}{}", base, paths::base::ABOUT))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(about.name, "meridian");

    daemon.close().await;
}

#[tokio::test]
async fn test_receive_and_query_region_hits() {
    let mut daemon = spawn_daemon().await;
    let base = daemon.address();
    let client = reqwest::Client::new();

    let resp: RegionHitsResponse = client
        .post(format!("{}{}", base, paths::region::HITS))
        .json(&region_hits("east", &[("x", 6), ("y", 2), ("z", 0)]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp.accepted, 2);

    let remote: RemoteHitsResponse =
        reqwest::get(format!("{}{}", base, paths::remote_hits_path("rule", "x")))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(remote.hits, 6);
    assert_eq!(remote.last_source.as_str(), "east");

    let missing = reqwest::get(format!("{}{}", base, paths::remote_hits_path("rule", "nope")))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    daemon.close().await;
}

#[tokio::test]
async fn test_rejects_hits_from_own_region() {
    let mut daemon = spawn_daemon().await;
    let resp = reqwest::Client::new()
        .post(format!("{}{}", daemon.address(), paths::region::HITS))
        .json(&region_hits("west", &[("x", 1)]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(daemon.replicated().is_empty());

    daemon.close().await;
}

#[tokio::test]
async fn test_queue_hits_validation() {
    let mut daemon = spawn_daemon().await;
    let client = reqwest::Client::new();
    let url = format!("{}{}", daemon.address(), paths::HITS);

    let accepted = client
        .post(&url)
        .json(&serde_json::json!({"name": "rule", "unique_key": "x", "hits": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let rejected = client
        .post(&url)
        .json(&serde_json::json!({"name": "rule", "unique_key": "x", "hits": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    daemon.close().await;
}

#[tokio::test]
async fn test_regions_and_expire_keys() {
    let mut daemon = spawn_daemon().await;
    let base = daemon.address();
    let client = reqwest::Client::new();

    let regions: RegionsResponse = reqwest::get(format!("{}{}", base, paths::region::REGIONS))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(regions.region.as_str(), "west");
    assert_eq!(regions.regions.len(), 1);
    assert!(regions.regions.contains_key(&RegionName::from("east")));

    client
        .post(format!("{}{}", base, paths::region::HITS))
        .json(&region_hits("east", &[("x", 1)]))
        .send()
        .await
        .unwrap();

    let kept: ExpireKeysResponse = client
        .post(format!("{}{}", base, paths::EXPIRE_KEYS))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(kept.expired, 0);
    assert_eq!(kept.remaining, 1);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let expired: ExpireKeysResponse = client
        .post(format!("{}{}?max_age_ms=0", base, paths::EXPIRE_KEYS))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(expired.expired, 1);
    assert_eq!(expired.remaining, 0);

    daemon.close().await;
}

#[tokio::test]
async fn test_dropped_daemon_shuts_down() {
    let daemon = spawn_daemon().await;
    let addr = daemon.local_addr();
    let manager = Arc::downgrade(daemon.manager());
    assert!(TcpStream::connect(addr).await.is_ok());

    drop(daemon);

    let deadline = Instant::now() + Duration::from_secs(2);
    while (manager.upgrade().is_some() || TcpStream::connect(addr).await.is_ok())
        && Instant::now() < deadline
    {
        time::sleep(Duration::from_millis(20)).await;
    }
    assert!(manager.upgrade().is_none(), "multi-region manager still alive");
    assert!(
        TcpStream::connect(addr).await.is_err(),
        "server still accepting connections"
    );
}
