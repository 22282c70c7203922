//! End-to-end tests for the background scheduler API

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const POLL_ATTEMPTS: usize = 100;
const POLL_INTERVAL_MS: u64 = 50;

async fn wait_for_stories(client: &TestClient, expected: usize) -> bool {
    for _ in 0..POLL_ATTEMPTS {
        let body: Value = client.stats().await.json().await.unwrap();
        if body["total_records"] == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    false
}

#[tokio::test]
async fn test_lists_registered_jobs() {
    let server = TestServer::spawn_with_scheduler().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.jobs().await;
    assert_eq!(response.status(), StatusCode::OK);
    let jobs: Vec<Value> = response.json().await.unwrap();

    let ids: Vec<&str> = jobs.iter().filter_map(|j| j["id"].as_str()).collect();
    assert_eq!(ids, vec!["full-refresh", "initial", "quick"]);

    let initial = jobs.iter().find(|j| j["id"] == "initial").unwrap();
    assert_eq!(initial["schedule"]["type"], "once");
    assert_eq!(initial["is_running"], false);
    assert!(initial["last_run"].is_null());
    assert!(initial["next_run_at"].is_string());

    let quick = jobs.iter().find(|j| j["id"] == "quick").unwrap();
    assert_eq!(quick["schedule"]["type"], "interval");
    assert_eq!(quick["schedule"]["value_secs"], 3600);

    server.stop_scheduler().await;
}

#[tokio::test]
async fn test_triggered_job_runs_pipeline() {
    let server = TestServer::spawn_with_scheduler().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.trigger_job("initial").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["job_id"], "initial");

    assert!(
        wait_for_stories(&client, FIXTURE_STORY_COUNT).await,
        "triggered job did not build stories"
    );

    let mut last_run = Value::Null;
    for _ in 0..POLL_ATTEMPTS {
        let jobs: Vec<Value> = client.jobs().await.json().await.unwrap();
        let initial = jobs.iter().find(|j| j["id"] == "initial").unwrap();
        if !initial["last_run"].is_null() {
            last_run = initial["last_run"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
    assert_eq!(last_run["status"], "success");
    assert_eq!(last_run["triggered_by"], "manual");

    server.stop_scheduler().await;
}

#[tokio::test]
async fn test_trigger_unknown_job_is_not_found() {
    let server = TestServer::spawn_with_scheduler().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.trigger_job("nightly-cleanup").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.stop_scheduler().await;
}

#[tokio::test]
async fn test_trigger_after_stop_is_unavailable() {
    let server = TestServer::spawn_with_scheduler().await;
    let client = TestClient::new(server.base_url.clone());

    server.stop_scheduler().await;

    let response = client.trigger_job("quick").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
