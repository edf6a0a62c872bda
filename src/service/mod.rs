//! HTTP service for Tidings.
//!
//! Routes:
//! - `GET  /notifications` - all notifications of the caller
//! - `GET  /notifications/unread` - unread notifications of the caller
//! - `GET  /notifications/unread/count` - unread count
//! - `GET  /notifications/stream` - live Server-Sent Events stream
//! - `POST /notifications/{id}/read` - mark one read
//! - `POST /notifications/read-all` - mark all read
//! - `GET  /health`, `GET /ready` - probes

pub mod broadcaster;
pub mod error;
pub mod notifications;
pub mod stream;

pub use broadcaster::{Broadcaster, BroadcasterConfig};
pub use error::ApiError;
pub use stream::StreamEvent;

use std::fmt;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::store::NotificationStore;

/// Resolves the authenticated user of a request.
///
/// `None` or an empty string means the caller is not authenticated.
pub type IdentityFn = Arc<dyn Fn(&HeaderMap) -> Option<String> + Send + Sync>;

/// Identity taken verbatim from a trusted header set by an upstream proxy.
pub fn header_identity(name: HeaderName) -> IdentityFn {
    Arc::new(move |headers: &HeaderMap| {
        headers
            .get(&name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(ToString::to_string)
    })
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NotificationStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub identity: IdentityFn,
}

impl AppState {
    /// Build state around `store`, with a broadcaster over its registry.
    pub fn new(store: Arc<NotificationStore>, config: BroadcasterConfig, identity: IdentityFn) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(store.registry(), config));
        Self {
            store,
            broadcaster,
            identity,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

/// The authenticated caller, resolved through [`AppState::identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match (state.identity)(&parts.headers) {
            Some(user_id) if !user_id.is_empty() => Ok(Self(user_id)),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(notifications::list_all))
        .route("/notifications/unread", get(notifications::list_unread))
        .route("/notifications/unread/count", get(notifications::unread_count))
        .route("/notifications/stream", get(stream::stream_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle GET /health - Basic health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handle GET /ready - Readiness check.
async fn ready_handler() -> impl IntoResponse {
    (StatusCode::OK, "READY")
}
