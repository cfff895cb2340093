use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a chat message.
///
/// Exactly two roles exist. The SQLite schema enforces the same pair with a
/// CHECK constraint on the stored text form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Returns the stored text form ("user" / "assistant").
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parses the stored text form. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// A named, timestamped container for one conversation with the assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique within its store. UUIDv4 text when generated on-device,
    /// server-assigned text otherwise.
    pub id: String,
    /// Human-readable label, mutable by rename.
    pub title: String,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Optional classification tags, immutable after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<String>,
}

impl ChatSession {
    /// Creates a session with a fresh device-generated id.
    pub fn new_local(title: impl Into<String>, meta: SessionMeta) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: Utc::now(),
            card_theme: meta.card_theme,
            card_title: meta.card_title,
            theme_id: meta.theme_id,
        }
    }

    /// Returns the classification tags of this session.
    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            card_theme: self.card_theme.clone(),
            card_title: self.card_title.clone(),
            theme_id: self.theme_id.clone(),
        }
    }
}

/// Optional classification tags supplied at session creation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub card_theme: Option<String>,
    pub card_title: Option<String>,
    pub theme_id: Option<String>,
}

impl SessionMeta {
    pub fn new(
        card_theme: Option<String>,
        card_title: Option<String>,
        theme_id: Option<String>,
    ) -> Self {
        Self {
            card_theme,
            card_title,
            theme_id,
        }
    }
}

/// Sorts sessions for display, newest first.
///
/// Ties break on id so the order is stable across reloads.
pub fn sort_sessions_newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// =============================================================================
// Messages
// =============================================================================

/// A persisted chat message. Belongs to exactly one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Creates a message with a fresh id, timestamped now.
    pub fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Sorts messages into conversation order, oldest first, ties broken on id.
pub fn sort_messages_oldest_first(messages: &mut [StoredMessage]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

// =============================================================================
// Interpolation source
// =============================================================================

/// Variables available to prompt templates, keyed by the exact name used
/// inside `{{key}}` placeholders.
///
/// Backed by a `BTreeMap` so iteration order is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessProfile {
    vars: BTreeMap<String, String>,
}

impl BusinessProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for BusinessProfile {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BusinessProfile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// Operation results
// =============================================================================

/// Result of a session listing.
///
/// `ready` is false while the auth state is still resolving and no backend
/// has been consulted; the sessions vector is empty in that case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<ChatSession>,
    pub ready: bool,
}

impl SessionList {
    pub fn not_ready() -> Self {
        Self {
            sessions: Vec::new(),
            ready: false,
        }
    }

    pub fn ready(sessions: Vec<ChatSession>) -> Self {
        Self {
            sessions,
            ready: true,
        }
    }
}

/// Outcome of an anonymous-to-authenticated migration pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Sessions recreated remotely and removed from local storage.
    pub migrated: usize,
    /// Sessions still local after the pass stopped.
    pub remaining: usize,
    /// Id of the session whose remote creation failed, when the pass
    /// stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_session: Option<String>,
}

impl MigrationReport {
    /// True when every local session made it to the remote store.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}
