//! Common test utilities and fixtures.

#![cfg(feature = "server")]
#![allow(dead_code)]

use std::path::PathBuf;

use axum_test::TestServer;
use global_cache::cache::ManualClock;
use global_cache::server::{AppState, router};
use global_cache::{Coordinator, FsStore};
use serde_json::Value as Json;
use tempfile::TempDir;

/// Run identifier used in request paths.
pub const RUN: &str = "test-run";

/// Fixed start time for tests driving a manual clock.
pub const START_MILLIS: u64 = 1_700_000_000_000;

// =============================================================================
// Test Application
// =============================================================================

/// Test application wrapper that manages a temporary durable store.
pub struct TestApp {
    pub server: TestServer,
    pub clock: ManualClock,
    temp_dir: TempDir,
}

impl TestApp {
    /// Create a new test application with a fresh temporary store.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_dir(TempDir::new()?, ManualClock::new(START_MILLIS))
    }

    /// Start a new run over the same durable store, as a later test session would.
    pub fn next_run(self) -> anyhow::Result<Self> {
        let clock = self.clock.clone();
        Self::with_dir(self.temp_dir, clock)
    }

    fn with_dir(temp_dir: TempDir, clock: ManualClock) -> anyhow::Result<Self> {
        let store = FsStore::new(temp_dir.path().join("cache"));
        let coordinator = Coordinator::builder(store)
            .clock(clock.clone())
            .run_id(RUN)
            .build();
        let server = TestServer::new(router(AppState::new(coordinator)))?;
        Ok(Self {
            server,
            clock,
            temp_dir,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// `GET .../get`, returning the JSON body.
    pub async fn get(&self, key: &str, sig: &str, ttl: Option<&str>) -> Json {
        let mut request = self
            .server
            .get(&format!("/api/v1/run/{}/get", RUN))
            .add_query_param("key", key)
            .add_query_param("sig", sig);
        if let Some(ttl) = ttl {
            request = request.add_query_param("ttl", ttl);
        }
        let response = request.await;
        response.assert_status_ok();
        response.json()
    }

    /// `POST .../set` with a value, returning the entry snapshot.
    pub async fn set(&self, key: &str, value: Json) -> Json {
        let response = self
            .server
            .post(&format!("/api/v1/run/{}/set", RUN))
            .json(&serde_json::json!({ "key": key, "value": value }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// `POST .../set` reporting a failed computation.
    pub async fn set_error(&self, key: &str, message: &str) -> Json {
        let response = self
            .server
            .post(&format!("/api/v1/run/{}/set", RUN))
            .json(&serde_json::json!({ "key": key, "error": message }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    pub async fn get_stale(&self, key: &str) -> Json {
        let response = self
            .server
            .get(&format!("/api/v1/run/{}/get-stale", RUN))
            .add_query_param("key", key)
            .await;
        response.assert_status_ok();
        response.json()
    }
}

// =============================================================================
// Assertion Helpers
// =============================================================================

/// Assert a `get` body reports the given result kind.
pub fn assert_result(body: &Json, expected: &str) {
    assert_eq!(
        body["result"].as_str(),
        Some(expected),
        "unexpected get response: {}",
        body
    );
}
