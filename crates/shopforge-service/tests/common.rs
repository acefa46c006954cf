//! Common test utilities for shopforge integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;
use tokio::sync::mpsc;

use shopforge_core::{JobId, User, UserId};
use shopforge_service::{create_router, AppState, Providers, ServiceConfig};
use shopforge_store::{RocksStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Application state, for direct store access and worker control.
    pub state: AppState,
    /// The worker-pool receiver; tests that exercise provisioning take it,
    /// tests of the compensation path drop it to close the queue.
    pub job_rx: Option<mpsc::Receiver<JobId>>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The admin API key for operator requests.
    pub admin_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and no providers.
    pub fn new() -> Self {
        Self::with_providers(Providers::default())
    }

    /// Create a harness with injected (fake) providers.
    pub fn with_providers(providers: Providers) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let admin_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            admin_api_key: Some(admin_key.clone()),
            ..ServiceConfig::default()
        };

        let (state, job_rx) = AppState::new(store, config, providers);
        let router: Router = create_router(state.clone());

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            state,
            job_rx: Some(job_rx),
            _temp_dir: temp_dir,
            test_user_id,
            admin_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get an auth header for an arbitrary user.
    pub fn auth_header_for(user_id: UserId) -> String {
        format!("Bearer test-token:{user_id}")
    }

    /// Seed a user directly in the store with the given balance.
    pub fn seed_user(&self, user_id: UserId, credits: i64) {
        let mut user = User::new(user_id, "owner@example.com");
        user.credits = credits;
        self.state.store.put_user(&user).expect("Failed to seed user");
    }

    /// Seed the default test user.
    pub fn seed_default_user(&self, credits: i64) {
        self.seed_user(self.test_user_id, credits);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
