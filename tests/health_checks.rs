//! Health monitoring against a running balancer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tcp_balancer::load_balancer::PolicyKind;

mod common;

/// Wait up to five seconds for the status file to satisfy `check`.
async fn wait_for_status(path: &std::path::Path, check: impl Fn(&str) -> bool) -> String {
    for _ in 0..50 {
        if let Ok(text) = tokio::fs::read_to_string(path).await {
            if check(&text) {
                return text;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("status file {} never matched", path.display());
}

#[tokio::test]
async fn unhealthy_backend_is_reported_and_skipped() {
    let backends = [
        common::start_echo_backend().await,
        common::refused_addr(),
        common::start_echo_backend().await,
    ];
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::balancer_config(&backends, PolicyKind::RoundRobin, &dir);
    config.health_check.interval_secs = 1;
    let balancer = common::spawn_balancer_with(config, dir).await;

    let status = wait_for_status(&balancer.status_path, |s| s.contains("[unhealthy]")).await;
    let lines: Vec<_> = status.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Health Status:");
    assert!(lines[1].starts_with(&format!("{} [healthy]", backends[0])));
    assert_eq!(lines[2], format!("{} [unhealthy] Requests: 0 Active: 0", backends[1]));
    assert!(lines[3].starts_with(&format!("{} [healthy]", backends[2])));
    assert_eq!(balancer.registry.healthy_indices(), vec![0, 2]);

    let mut seen = Vec::new();
    for _ in 0..4 {
        let response = common::send_request(balancer.addr, &common::post("skip")).await;
        seen.push(common::echoed_port(&response).unwrap());
    }
    let (p0, p2) = (backends[0].port(), backends[2].port());
    assert_eq!(seen, vec![p0, p2, p0, p2]);

    // counters show up in the next snapshot
    let status = wait_for_status(&balancer.status_path, |s| s.contains("Requests: 2")).await;
    assert!(status.contains(&format!("{} [healthy] Requests: 2 Active: 0", backends[0])));

    balancer.stop().await;
}

#[tokio::test]
async fn failing_backend_recovers_on_later_round() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                (503, "Service Unavailable".into())
            } else {
                (200, "OK".into())
            }
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = common::balancer_config(&[backend], PolicyKind::RoundRobin, &dir);
    config.health_check.interval_secs = 1;
    let balancer = common::spawn_balancer_with(config, dir).await;

    wait_for_status(&balancer.status_path, |s| s.contains("[unhealthy]")).await;
    wait_for_status(&balancer.status_path, |s| s.contains("[healthy]")).await;
    assert!(balancer.registry.is_healthy(0));
    assert!(calls.load(Ordering::SeqCst) >= 2);

    balancer.stop().await;
}

#[tokio::test]
async fn shutdown_lets_monitor_finish_its_cycle() {
    let backend = common::start_echo_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let status_dir = tempfile::tempdir().unwrap();
    let status_path = status_dir.path().join("status.txt");

    let mut config = common::balancer_config(&[backend], PolicyKind::RoundRobin, &dir);
    config.health_check.interval_secs = 1;
    config.health_check.status_file = status_path.display().to_string();
    let balancer = common::spawn_balancer_with(config, dir).await;
    let addr = balancer.addr;

    // triggered before the first round is due
    tokio::time::timeout(Duration::from_secs(5), balancer.stop())
        .await
        .unwrap();

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    let status = std::fs::read_to_string(&status_path).unwrap();
    assert_eq!(
        status,
        format!("Health Status:\n{} [healthy] Requests: 0 Active: 0\n", backend)
    );
}
