//! The notification entity.
//!
//! A notification is immutable once recorded except for its `read` flag.
//! Its JSON form is what the HTTP endpoints return and what the event
//! stream carries in `notification` events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{generate_notification_id, now_millis};

/// Severity of a notification, used by the UI for styling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

impl Level {
    /// The lowercase name used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "danger" => Ok(Self::Danger),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// A single notification addressed to one user.
///
/// Empty `id`, `user_id` and a zero `created_at` mean "not assigned yet";
/// the store fills them in when the notification is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default)]
    pub read: bool,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

impl Notification {
    /// Create a notification with the given level.
    pub fn new(level: Level, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            level,
            ..Self::default()
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Level::Info, title, body)
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Level::Success, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Level::Warning, title, body)
    }

    pub fn danger(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Level::Danger, title, body)
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Attach a call-to-action link rendered alongside the notification.
    #[must_use]
    pub fn with_action(mut self, url: impl Into<String>, label: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_label = Some(label.into());
        self
    }

    /// Assign the owner and any identity fields still unset.
    ///
    /// Called once, when the notification is recorded. Fields the producer
    /// already set are left alone, apart from `user_id` which always follows
    /// the recipient.
    pub(crate) fn fill_defaults(&mut self, user_id: &str) {
        self.stamp();
        user_id.clone_into(&mut self.user_id);
    }

    /// Assign `id` and `created_at` if unset, leaving the owner untouched.
    pub(crate) fn stamp(&mut self) {
        if self.id.is_empty() {
            self.id = generate_notification_id();
        }
        if self.created_at == 0 {
            self.created_at = now_millis();
        }
    }
}
