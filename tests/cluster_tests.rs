//! End-to-end propagation between daemons started by the local cluster bootstrap
use meridian::api::hits::RemoteHitsResponse;
use meridian::api::paths;
use meridian::cluster::LocalCluster;
use meridian::hits::HitEvent;
use reqwest::StatusCode;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Duration, Instant};

async fn post_hit(base: &str, hit: &HitEvent) -> StatusCode {
    reqwest::Client::new()
        .post(format!("{}{}", base, paths::HITS))
        .json(hit)
        .send()
        .await
        .expect("Should reach daemon")
        .status()
}

async fn remote_hits(base: &str, name: &str, unique_key: &str) -> Option<i64> {
    let resp = reqwest::get(format!(
        "{}{}",
        base,
        paths::remote_hits_path(name, unique_key)
    ))
    .await
    .expect("Should reach daemon");
    if resp.status() == StatusCode::NOT_FOUND {
        return None;
    }
    let body: RemoteHitsResponse = resp.json().await.expect("Should deserialize");
    Some(body.hits)
}

/// Poll until `unique_key` reaches `expected` on `base` or two seconds pass
async fn wait_for_hits(base: &str, unique_key: &str, expected: i64) -> Option<i64> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let hits = remote_hits(base, "rule", unique_key).await;
        if hits == Some(expected) || Instant::now() > deadline {
            return hits;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_start_multiple_instances() {
    let cluster = LocalCluster::start(2).await.unwrap();

    assert_eq!(cluster.peers().len(), 2);
    assert_eq!(cluster.daemons().len(), 2);
    assert_ne!(cluster.peer_at(0), cluster.peer_at(1));
    assert_eq!(cluster.daemon_at(1).peer_info(), *cluster.peer_at(1));
    assert!(cluster.random_peer().is_some());

    // Every daemon knows every other region, never its own
    for daemon in cluster.daemons() {
        let regions = daemon.registry().regions().await;
        assert_eq!(regions.len(), 1);
        assert!(!regions.contains_key(daemon.region()));
    }

    cluster.stop().await;
}

#[tokio::test]
async fn test_start_zero_instances() {
    let cluster = LocalCluster::start(0).await.unwrap();

    assert_eq!(cluster.peers().len(), 1);
    assert_eq!(cluster.daemons().len(), 1);
    cluster.stop().await;
}

/// Reserve a free localhost port by binding and releasing it
async fn free_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

#[tokio::test]
async fn test_start_multiple_instances_with_addresses() {
    let first = free_address().await;
    let second = free_address().await;
    let cluster = LocalCluster::start_with(&[first.as_str(), second.as_str()])
        .await
        .unwrap();

    assert_eq!(cluster.peers().len(), 2);
    assert_eq!(cluster.peer_at(0).address, format!("http://{}", first));
    assert_eq!(cluster.peer_at(1).address, format!("http://{}", second));
    assert_eq!(cluster.daemon_at(0).local_addr().to_string(), first);
    assert_eq!(cluster.daemon_at(1).local_addr().to_string(), second);
    assert!(TcpStream::connect(first.as_str()).await.is_ok());

    cluster.stop().await;
    assert!(TcpStream::connect(first.as_str()).await.is_err());
}

#[tokio::test]
async fn test_start_with_addresses_fail() {
    let first = free_address().await;
    let result = LocalCluster::start_with(&[first.as_str(), "1111"]).await;
    assert!(result.is_err());

    // The daemon started before the failure was closed again
    assert!(TcpStream::connect(first.as_str()).await.is_err());
}

#[tokio::test]
async fn test_hits_propagate_to_other_regions() {
    let cluster = LocalCluster::start(3).await.unwrap();
    let origin = cluster.daemon_at(0).address();

    for (key, hits) in [("x", 5), ("y", 2), ("x", 1)] {
        let status = post_hit(&origin, &HitEvent::new("rule", key, hits)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    for peer in &cluster.peers()[1..] {
        assert_eq!(wait_for_hits(&peer.address, "x", 6).await, Some(6));
        assert_eq!(wait_for_hits(&peer.address, "y", 2).await, Some(2));
    }
    // The origin region does not replicate to itself
    assert_eq!(remote_hits(&origin, "rule", "x").await, None);

    cluster.stop().await;
}

#[tokio::test]
async fn test_hits_rejected_after_daemon_closed() {
    let cluster = LocalCluster::start(2).await.unwrap();
    let daemon = cluster.daemon_at(0);

    daemon.manager().stop().await;
    let result = daemon
        .manager()
        .queue_hits(HitEvent::new("rule", "x", 1))
        .await;
    assert!(matches!(result, Err(meridian::MeridianError::Shutdown)));

    let status = post_hit(&daemon.address(), &HitEvent::new("rule", "x", 1)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    cluster.stop().await;
}
