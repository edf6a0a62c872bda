//! Test utilities and in-process app harness for Tidings tests.
//!
//! Provides:
//! - Router construction over either store form
//! - Request helpers carrying the identity header
//! - Temporary database fixtures

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::Router;
use tempfile::TempDir;
use tidings::observability::tracing::init_test_tracing;
use tidings::service::{create_router, header_identity, AppState, BroadcasterConfig};
use tidings::storage::SqliteRepository;
use tidings::{NotificationStore, StoreConfig};

pub const IDENTITY_HEADER: &str = "x-user-id";

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An app wired the way the server wires it.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    /// Keeps the SQLite file alive for persistent apps.
    _fixture: Option<TestFixture>,
}

impl TestApp {
    /// App over the ephemeral store.
    pub fn in_memory(store: StoreConfig, broadcaster: BroadcasterConfig) -> Self {
        Self::build(NotificationStore::in_memory(store), broadcaster, None)
    }

    /// App over a SQLite-backed store in a fresh temp directory.
    pub fn sqlite(store: StoreConfig, broadcaster: BroadcasterConfig) -> Self {
        let fixture = TestFixture::new();
        let repository =
            SqliteRepository::open(&fixture.db_path, 2, store.max_per_user)
                .expect("failed to open sqlite");
        Self::build(
            NotificationStore::persistent(Arc::new(repository), store),
            broadcaster,
            Some(fixture),
        )
    }

    fn build(
        store: NotificationStore,
        broadcaster: BroadcasterConfig,
        fixture: Option<TestFixture>,
    ) -> Self {
        init_test_tracing();
        let identity = header_identity(HeaderName::from_static(IDENTITY_HEADER));
        let state = AppState::new(Arc::new(store), broadcaster, identity);
        let router = create_router(state.clone());
        Self {
            state,
            router,
            _fixture: fixture,
        }
    }
}

/// Build a request, optionally authenticated as `user`.
pub fn request(method: &str, uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(IDENTITY_HEADER, user);
    }
    builder.body(Body::empty()).expect("invalid request")
}

/// Wait for a condition to become true with timeout.
///
/// # Arguments
///
/// * `timeout` - Maximum time to wait
/// * `condition` - Closure that returns true when condition is met
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
