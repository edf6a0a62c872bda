//! Server-Sent Events endpoint.
//!
//! Wire format per event:
//!
//! ```text
//! event: <name>
//! data: <json>
//!
//! ```
//!
//! Event names are `connected`, `notification` and `heartbeat`.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use serde_json::json;

use super::error::ApiError;
use super::{AppState, CurrentUser};
use crate::notification::Notification;

const EVENT_STREAM: &str = "text/event-stream";

/// One event on a notification stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Sent once when the stream opens.
    Connected { user_id: String },
    Notification(Notification),
    /// Keeps idle connections open through proxies.
    Heartbeat { timestamp: i64 },
}

impl StreamEvent {
    /// The `event:` line value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Notification(_) => "notification",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// The `data:` line value.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Connected { user_id } => Ok(json!({ "status": "connected", "user_id": user_id })),
            Self::Notification(n) => serde_json::to_value(n),
            Self::Heartbeat { timestamp } => Ok(json!({ "timestamp": timestamp })),
        }
    }

    /// Frame as a Server-Sent Event.
    pub fn to_sse(&self) -> Result<Event, axum::Error> {
        let payload = self.payload().map_err(axum::Error::new)?;
        Event::default().event(self.name()).json_data(payload)
    }
}

/// Whether the client's `Accept` header allows an event stream.
///
/// A missing header accepts anything.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    let values: Vec<_> = headers.get_all(header::ACCEPT).iter().collect();
    if values.is_empty() {
        return true;
    }
    values
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|range| range.split(';').next().unwrap_or_default().trim())
        .any(|range| range.eq_ignore_ascii_case(EVENT_STREAM) || range == "text/*" || range == "*/*")
}

/// Handle GET /notifications/stream.
///
/// Rejects unauthenticated callers first, then callers that cannot
/// receive an event stream.
#[tracing::instrument(skip_all)]
pub async fn stream_notifications(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if !accepts_event_stream(&headers) {
        return Err(ApiError::StreamingUnsupported);
    }

    let events = state
        .broadcaster
        .connect(&user_id)
        .map(|event| event.to_sse());

    Ok(Sse::new(events))
}
