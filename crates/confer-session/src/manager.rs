//! Session manager: routes every operation to the store that owns the data.
//!
//! The backing store is decided by the observed auth state alone, never by
//! searching both stores: anonymous state works against the device-local
//! store, authenticated state against the remote store, and unresolved state
//! refuses mutations. The one place cross-store writes happen is the
//! anonymous-to-authenticated migration.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use confer_core::types::{
    BusinessProfile, ChatSession, MessageRole, MigrationReport, SessionList, SessionMeta,
    StoredMessage,
};
use confer_prompt::{find_card, interpolate_with_query};
use confer_store::{LocalSessionStore, SessionStore};

use crate::assistant::Assistant;
use crate::auth::AuthState;
use crate::error::SessionError;
use crate::quota::InteractionQuota;

/// Orchestrates session operations over the local and remote stores.
pub struct SessionManager {
    local: Arc<LocalSessionStore>,
    remote: Arc<dyn SessionStore>,
    auth: watch::Receiver<AuthState>,
    quota: InteractionQuota,
    assistant: Arc<dyn Assistant>,
    profile: BusinessProfile,
    deleting: Mutex<HashSet<String>>,
    current: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(
        local: Arc<LocalSessionStore>,
        remote: Arc<dyn SessionStore>,
        auth: watch::Receiver<AuthState>,
        quota: InteractionQuota,
        assistant: Arc<dyn Assistant>,
        profile: BusinessProfile,
    ) -> Self {
        Self {
            local,
            remote,
            auth,
            quota,
            assistant,
            profile,
            deleting: Mutex::new(HashSet::new()),
            current: Mutex::new(None),
        }
    }

    /// Sessions of the active backend, newest first.
    ///
    /// While auth state is unresolved this answers an empty, not-ready list
    /// instead of guessing a backend.
    pub async fn list_sessions(&self) -> Result<SessionList, SessionError> {
        match self.auth_state() {
            AuthState::Unknown => Ok(SessionList::not_ready()),
            AuthState::Anonymous => Ok(SessionList::ready(self.local.load().await)),
            AuthState::Authenticated(user_id) => {
                let sessions = self.remote.list_sessions(&user_id).await?;
                Ok(SessionList::ready(sessions))
            }
        }
    }

    /// Creates a session in the active backend and makes it current.
    ///
    /// The anonymous path is refused outright when the daily quota is
    /// exhausted; nothing is created in that case.
    pub async fn create_session(
        &self,
        title: &str,
        meta: SessionMeta,
    ) -> Result<ChatSession, SessionError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }

        let state = self.auth_state();
        let (store, owner) = self.backend_for(&state)?;
        if state == AuthState::Anonymous && self.quota.remaining().await == 0 {
            return Err(SessionError::QuotaExceeded);
        }

        let session = store.create_session(&owner, title, meta).await?;
        info!(session_id = %session.id, title = %session.title, "Created session");
        if let Ok(mut current) = self.current.lock() {
            *current = Some(session.id.clone());
        }
        Ok(session)
    }

    /// Deletes a session and its messages from the active backend.
    ///
    /// Idempotent under retry: an id that is already gone is a success. A
    /// second delete of an id whose delete is still in flight is dropped
    /// without a backend call; the in-flight flag is released on success and
    /// failure alike.
    pub async fn delete_session(&self, id: &str) -> Result<(), SessionError> {
        let state = self.auth_state();
        let (store, _owner) = self.backend_for(&state)?;

        {
            let mut deleting = self
                .deleting
                .lock()
                .map_err(|e| SessionError::Store(format!("delete set lock poisoned: {}", e)))?;
            if !deleting.insert(id.to_string()) {
                debug!(session_id = %id, "Delete already in flight; dropping duplicate");
                return Ok(());
            }
        }
        let _guard = DeleteGuard {
            deleting: &self.deleting,
            id,
        };

        store.delete_session(id).await?;
        if let Ok(mut current) = self.current.lock() {
            if current.as_deref() == Some(id) {
                *current = None;
            }
        }
        Ok(())
    }

    /// Updates a session title in the active backend.
    ///
    /// A title that is empty after trimming is rejected here, before any
    /// store round trip.
    pub async fn rename_session(&self, id: &str, new_title: &str) -> Result<(), SessionError> {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            return Err(SessionError::EmptyTitle);
        }

        let state = self.auth_state();
        let (store, _owner) = self.backend_for(&state)?;
        store.rename_session(id, new_title).await?;
        Ok(())
    }

    /// Runs one chat turn: persist the user message, ask the assistant,
    /// persist the reply, return it.
    ///
    /// The anonymous path consumes one quota interaction first. An assistant
    /// failure surfaces to the caller without retry; the user message stays
    /// persisted since its append had fully applied.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<StoredMessage, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let state = self.auth_state();
        let (store, _owner) = self.backend_for(&state)?;

        let session = store
            .find_session(session_id)
            .await?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        if state == AuthState::Anonymous {
            self.quota.consume().await?;
        }

        let user_message = StoredMessage::new(session_id, MessageRole::User, text);
        store.append_message(&user_message).await?;

        let prompt = self.build_prompt(&session, text);
        let reply = match self.assistant.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Assistant call failed");
                return Err(SessionError::Assistant(e.to_string()));
            }
        };

        let assistant_message = StoredMessage::new(session_id, MessageRole::Assistant, &reply);
        store.append_message(&assistant_message).await?;
        Ok(assistant_message)
    }

    /// Message history of one session in conversation order.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, SessionError> {
        let state = self.auth_state();
        let (store, _owner) = self.backend_for(&state)?;
        Ok(store.messages(session_id).await?)
    }

    /// Moves local sessions to the remote store after sign-in.
    ///
    /// Each local session is re-created remotely oldest-first, preserving
    /// title and theme metadata, then removed locally (messages first). The
    /// pass stops at the first failure without automatic retry: earlier
    /// sessions stay migrated, the rest stay local, and the error reports
    /// both counts.
    pub async fn migrate_local_sessions(&self) -> Result<MigrationReport, SessionError> {
        let user_id = match self.auth_state() {
            AuthState::Unknown => return Err(SessionError::NotReady),
            AuthState::Anonymous => return Err(SessionError::NotAuthenticated),
            AuthState::Authenticated(user_id) => user_id,
        };

        let loaded = self.local.load().await;
        if loaded.is_empty() {
            return Ok(MigrationReport::default());
        }
        let total = loaded.len();
        let mut current = loaded.clone();
        let mut to_migrate = loaded;
        // Oldest first, so earlier history lands remotely first.
        to_migrate.reverse();

        let stopped = |migrated: usize, failed: String| {
            SessionError::MigrationIncomplete(MigrationReport {
                migrated,
                remaining: total - migrated,
                failed_session: Some(failed),
            })
        };

        let mut migrated = 0;
        for session in to_migrate {
            if let Err(e) = self
                .remote
                .create_session(&user_id, &session.title, session.meta())
                .await
            {
                warn!(session_id = %session.id, error = %e, "Remote create failed; stopping migration");
                return Err(stopped(migrated, session.id));
            }
            match self.local.delete(&session.id, &current).await {
                Ok(updated) => current = updated,
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "Local removal failed; stopping migration");
                    return Err(stopped(migrated, session.id));
                }
            }
            migrated += 1;
        }

        info!(count = migrated, "Migrated local sessions to remote store");
        Ok(MigrationReport {
            migrated,
            remaining: 0,
            failed_session: None,
        })
    }

    /// Anonymous interactions left today.
    pub async fn quota_remaining(&self) -> u32 {
        self.quota.remaining().await
    }

    /// Id of the most recently created session, if it still exists.
    pub fn current_session_id(&self) -> Option<String> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    // -- Private helpers --

    fn auth_state(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    /// The store owning sessions in `state`, with the owner scope to use.
    ///
    /// The local store is device-scoped and ignores the owner string.
    fn backend_for(
        &self,
        state: &AuthState,
    ) -> Result<(Arc<dyn SessionStore>, String), SessionError> {
        match state {
            AuthState::Unknown => Err(SessionError::NotReady),
            AuthState::Anonymous => Ok((
                Arc::clone(&self.local) as Arc<dyn SessionStore>,
                String::new(),
            )),
            AuthState::Authenticated(user_id) => {
                Ok((Arc::clone(&self.remote), user_id.clone()))
            }
        }
    }

    /// The prompt for one turn: the session's card template interpolated
    /// with the business profile and the literal user text, or the raw text
    /// when the session carries no known theme.
    fn build_prompt(&self, session: &ChatSession, text: &str) -> String {
        match session.theme_id.as_deref().and_then(find_card) {
            Some(card) => interpolate_with_query(card.template, &self.profile, text),
            None => text.to_string(),
        }
    }
}

/// Clears the in-flight flag for one session id when dropped.
struct DeleteGuard<'a> {
    deleting: &'a Mutex<HashSet<String>>,
    id: &'a str,
}

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut deleting) = self.deleting.lock() {
            deleting.remove(self.id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
