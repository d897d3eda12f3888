//! Failure injection tests against real sockets.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use resilient_client::health::HealthState;
use resilient_client::{admin, ClientError, ServiceClient, Strategy};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_retry_recovers_from_transient_errors() {
    let backend = common::sequence_backend(vec![503, 503]).await;
    let client = ServiceClient::new(common::config_for(&[&backend.url])).unwrap();

    let response = client.get("/orders").await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.text(), "reply 2");
    assert_eq!(response.attempts.len(), 3);
    assert_eq!(response.attempts[0].status, Some(503));
    assert_eq!(backend.hits(), 3);

    let metrics = client.get_metrics();
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.successful_requests, 1);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_status() {
    let backend = common::fixed_backend(502, "bad gateway").await;
    let client = ServiceClient::new(common::config_for(&[&backend.url])).unwrap();

    let err = client.get("/orders").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.attempts(), 3);
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let backend = common::fixed_backend(404, "missing").await;
    let client = ServiceClient::new(common::config_for(&[&backend.url])).unwrap();

    let err = client.get("/missing").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 404, attempts: 1, .. }));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_failover_from_refused_endpoint() {
    let dead = common::closed_port_url().await;
    let backend = common::fixed_backend(200, "alive").await;
    let client = ServiceClient::new(common::config_for(&[&dead, &backend.url])).unwrap();

    for _ in 0..6 {
        let response = client.get("/ping").await.unwrap();
        assert!(backend.is(&response.endpoint));
    }

    let dead_stats = client
        .endpoints()
        .into_iter()
        .find(|ep| ep.url.trim_end_matches('/') == dead)
        .unwrap();
    assert!(dead_stats.failed_requests > 0);
    assert_eq!(dead_stats.successful_requests, 0);
}

#[tokio::test]
async fn test_slow_endpoint_times_out_and_retries_elsewhere() {
    let slow = common::slow_backend(Duration::from_secs(5)).await;
    let fast = common::fixed_backend(200, "fast").await;
    let mut config = common::config_for(&[&slow.url, &fast.url]);
    config.timeouts.request_secs = 0.2;
    let client = ServiceClient::new(config).unwrap();

    for _ in 0..4 {
        let response = client.get("/quote").await.unwrap();
        assert!(fast.is(&response.endpoint));
        assert!(response.elapsed < Duration::from_secs(2));
    }
}

#[tokio::test]
async fn test_circuit_breaker_fails_fast() {
    let backend = common::fixed_backend(500, "boom").await;
    let mut config = common::config_for(&[&backend.url]);
    config.retries.max_attempts = 1;
    config.circuit_breaker.failure_threshold = 2;
    let client = ServiceClient::new(config).unwrap();

    for _ in 0..2 {
        assert_eq!(client.get("/x").await.unwrap_err().status(), Some(500));
    }
    assert!(matches!(client.get("/x").await, Err(ClientError::CircuitOpen)));
    assert_eq!(backend.hits(), 2);
    assert_eq!(client.get_metrics().circuit_rejections, 1);
}

#[tokio::test]
async fn test_health_monitor_evicts_failing_endpoint() {
    let sick = common::spawn_backend(|path| async move {
        if path == "/health" {
            (503, "down".to_string())
        } else {
            (200, "sick".to_string())
        }
    })
    .await;
    let well = common::fixed_backend(200, "well").await;

    let mut config = common::config_for(&[&sick.url, &well.url]);
    config.load_balancer.strategy = Strategy::RoundRobin;
    config.load_balancer.health_check.enabled = true;
    config.load_balancer.health_check.interval_secs = 0.05;
    config.load_balancer.health_check.failure_threshold = 2;
    let client = ServiceClient::new(config).unwrap();
    let (sick, well) = (&sick, &well);

    client
        .run(|client| async move {
            tokio::time::sleep(Duration::from_millis(400)).await;

            let snapshot = client
                .endpoints()
                .into_iter()
                .find(|ep| ep.url.trim_end_matches('/') == sick.url)
                .unwrap();
            assert_eq!(snapshot.health, HealthState::Unhealthy);
            assert!(!snapshot.available);

            for _ in 0..5 {
                let response = client.get("/work").await.unwrap();
                assert!(well.is(&response.endpoint));
            }
        })
        .await;

    assert!(!client.is_connected());
    assert_eq!(sick.hits_for("/work"), 0);
    assert!(sick.hits_for("/health") >= 2);
}

#[tokio::test]
async fn test_cache_serves_repeated_get() {
    let backend = common::sequence_backend(vec![]).await;
    let mut config = common::config_for(&[&backend.url]);
    config.cache.enabled = true;
    let client = ServiceClient::new(config).unwrap();

    let first = client.get("/catalog").await.unwrap();
    let second = client.get("/catalog").await.unwrap();
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.body, second.body);
    assert_eq!(backend.hits(), 1);

    client.post("/catalog", "{}").await.unwrap();
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_admin_api_over_http() {
    let backend = common::fixed_backend(200, "ok").await;
    let client = Arc::new(ServiceClient::new(common::config_for(&[&backend.url])).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = resilient_client::Shutdown::new();
    let server = tokio::spawn(admin::serve(listener, client.clone(), "secret", shutdown.subscribe()));

    let http = reqwest::Client::new();
    let denied = http.get(format!("{}/admin/status", base)).send().await.unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let added = http
        .post(format!("{}/admin/endpoints", base))
        .bearer_auth("secret")
        .json(&serde_json::json!({ "url": "http://127.0.0.1:1", "weight": 2.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), StatusCode::CREATED);
    assert_eq!(client.endpoints().len(), 2);

    let health: serde_json::Value = http
        .get(format!("{}/admin/health", base))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    shutdown.trigger();
    server.await.unwrap().unwrap();
}
