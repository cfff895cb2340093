//! Device-local session store for anonymous usage.
//!
//! Keeps the whole session collection as one JSON document under a single
//! well-known key, with messages in a companion document grouped by owning
//! session. Every operation serializes behind one async lock, since a
//! mutation rewrites its whole document. Unreadable or corrupt state loads
//! as "no sessions" and is never surfaced to the caller as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use confer_core::error::{ConferError, Result};
use confer_core::types::{
    sort_messages_oldest_first, sort_sessions_newest_first, ChatSession, SessionMeta,
    StoredMessage,
};

use crate::kv::KeyValueStore;
use crate::remote::SessionStore;

/// Well-known key for the serialized session collection.
pub const SESSIONS_KEY: &str = "confer.sessions";
/// Well-known key for locally persisted messages, grouped by session id.
pub const MESSAGES_KEY: &str = "confer.messages";

type MessageMap = BTreeMap<String, Vec<StoredMessage>>;

pub struct LocalSessionStore {
    kv: Arc<dyn KeyValueStore>,
    // Held across each operation's whole load-mutate-save unit; the KV has
    // no transactions to make one atomic on its own.
    lock: Mutex<()>,
}

impl LocalSessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    /// Loads the persisted collection, newest first.
    ///
    /// Missing state loads as an empty collection. Corrupt state is logged
    /// and recovered the same way, never propagated.
    pub async fn load(&self) -> Vec<ChatSession> {
        let _guard = self.lock.lock().await;
        self.read_sessions().await
    }

    /// Replaces the entire persisted collection.
    pub async fn save(&self, sessions: &[ChatSession]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_sessions(sessions).await
    }

    /// Removes `id` from `current`, persists the result, and returns it.
    ///
    /// The session's messages go first, then the session entry. An id that
    /// is not present persists the collection unchanged and is not an error.
    pub async fn delete(&self, id: &str, current: &[ChatSession]) -> Result<Vec<ChatSession>> {
        let _guard = self.lock.lock().await;
        self.remove_session(id, current).await
    }

    /// Messages of one session in conversation order.
    ///
    /// Unreadable state loads as an empty history, same policy as `load`.
    pub async fn messages_for(&self, session_id: &str) -> Vec<StoredMessage> {
        let _guard = self.lock.lock().await;
        self.read_messages(session_id).await
    }

    /// Drops all messages owned by `session_id`.
    pub async fn remove_messages_for(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.drop_messages(session_id).await
    }

    // Internals below assume the caller holds `lock`.

    async fn read_sessions(&self) -> Vec<ChatSession> {
        let raw = match self.kv.get(SESSIONS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read local sessions; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<ChatSession>>(&raw) {
            Ok(mut sessions) => {
                sort_sessions_newest_first(&mut sessions);
                sessions
            }
            Err(e) => {
                warn!(error = %e, "Local session data corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_sessions(&self, sessions: &[ChatSession]) -> Result<()> {
        let raw = serde_json::to_string(sessions)?;
        self.kv.set(SESSIONS_KEY, &raw).await
    }

    async fn remove_session(&self, id: &str, current: &[ChatSession]) -> Result<Vec<ChatSession>> {
        self.drop_messages(id).await?;
        let updated: Vec<ChatSession> = current.iter().filter(|s| s.id != id).cloned().collect();
        self.write_sessions(&updated).await?;
        Ok(updated)
    }

    async fn read_messages(&self, session_id: &str) -> Vec<StoredMessage> {
        let mut messages = self
            .load_message_map()
            .await
            .remove(session_id)
            .unwrap_or_default();
        sort_messages_oldest_first(&mut messages);
        messages
    }

    async fn drop_messages(&self, session_id: &str) -> Result<()> {
        let mut map = self.load_message_map().await;
        if map.remove(session_id).is_some() {
            self.save_message_map(&map).await?;
        }
        Ok(())
    }

    async fn load_message_map(&self) -> MessageMap {
        let raw = match self.kv.get(MESSAGES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return MessageMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read local messages; treating as empty");
                return MessageMap::new();
            }
        };
        match serde_json::from_str::<MessageMap>(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "Local message data corrupt; treating as empty");
                MessageMap::new()
            }
        }
    }

    async fn save_message_map(&self, map: &MessageMap) -> Result<()> {
        let raw = serde_json::to_string(map)?;
        self.kv.set(MESSAGES_KEY, &raw).await
    }
}

#[async_trait]
impl SessionStore for LocalSessionStore {
    // The local store is device-scoped, so the owner argument is ignored.
    async fn list_sessions(&self, _owner: &str) -> Result<Vec<ChatSession>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_sessions().await)
    }

    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_sessions().await.into_iter().find(|s| s.id == id))
    }

    async fn create_session(
        &self,
        _owner: &str,
        title: &str,
        meta: SessionMeta,
    ) -> Result<ChatSession> {
        let _guard = self.lock.lock().await;
        let session = ChatSession::new_local(title, meta);
        let mut sessions = self.read_sessions().await;
        sessions.push(session.clone());
        self.write_sessions(&sessions).await?;
        Ok(session)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let current = self.read_sessions().await;
        self.remove_session(id, &current).await?;
        Ok(())
    }

    async fn rename_session(&self, id: &str, new_title: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut sessions = self.read_sessions().await;
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            return Err(ConferError::Store(format!("session not found: {}", id)));
        };
        session.title = new_title.to_string();
        self.write_sessions(&sessions).await
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_message_map().await;
        map.entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        self.save_message_map(&map).await
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_messages(session_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKvStore, MemoryKvStore};
    use confer_core::types::MessageRole;

    fn make_store() -> LocalSessionStore {
        LocalSessionStore::new(Arc::new(MemoryKvStore::new()))
    }

    fn file_store(dir: &tempfile::TempDir) -> LocalSessionStore {
        LocalSessionStore::new(Arc::new(FileKvStore::new(dir.path())))
    }

    async fn seeded_store(titles: &[&str]) -> LocalSessionStore {
        let store = make_store();
        for title in titles {
            store
                .create_session("", title, SessionMeta::default())
                .await
                .unwrap();
        }
        store
    }

    // ---- load / save ----

    #[tokio::test]
    async fn test_load_empty_when_nothing_persisted() {
        let store = make_store();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = make_store();
        let a = ChatSession::new_local("first", SessionMeta::default());
        let b = ChatSession::new_local("second", SessionMeta::default());
        store.save(&[a.clone(), b.clone()]).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&a));
        assert!(loaded.contains(&b));
    }

    #[tokio::test]
    async fn test_save_empty_collection_round_trips() {
        let store = make_store();
        store.save(&[]).await.unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_sorts_newest_first() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = LocalSessionStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>);

        // Persist out of order on purpose.
        let raw = r#"[
            {"id":"old","title":"old","created_at":"2024-01-01T00:00:00Z"},
            {"id":"new","title":"new","created_at":"2024-06-01T00:00:00Z"}
        ]"#;
        kv.set(SESSIONS_KEY, raw).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded[0].id, "new");
        assert_eq!(loaded[1].id, "old");
    }

    #[tokio::test]
    async fn test_corrupt_sessions_load_as_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(SESSIONS_KEY, "definitely not json").await.unwrap();

        let store = LocalSessionStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_sessions_load_as_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(SESSIONS_KEY, r#"{"not":"a list"}"#).await.unwrap();

        let store = LocalSessionStore::new(kv);
        assert!(store.load().await.is_empty());
    }

    // ---- delete ----

    #[tokio::test]
    async fn test_delete_removes_and_persists() {
        let store = seeded_store(&["one", "two"]).await;
        let current = store.load().await;
        let victim = current[0].id.clone();

        let updated = store.delete(&victim, &current).await.unwrap();
        assert_eq!(updated.len(), 1);
        assert!(!updated.iter().any(|s| s.id == victim));

        // The removal is persisted, not just returned.
        let reloaded = store.load().await;
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.iter().any(|s| s.id == victim));
    }

    #[tokio::test]
    async fn test_delete_absent_id_is_noop() {
        let store = seeded_store(&["keeper"]).await;
        let current = store.load().await;

        let updated = store.delete("no-such-id", &current).await.unwrap();
        assert_eq!(updated, current);
        assert_eq!(store.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_messages_first() {
        let store = seeded_store(&["with messages"]).await;
        let session = &store.load().await[0];

        SessionStore::append_message(
            &store,
            &StoredMessage::new(&session.id, MessageRole::User, "hello"),
        )
        .await
        .unwrap();
        assert_eq!(store.messages_for(&session.id).await.len(), 1);

        store.delete_session(&session.id).await.unwrap();
        assert!(store.messages_for(&session.id).await.is_empty());
        assert!(store.load().await.is_empty());
    }

    // ---- messages ----

    #[tokio::test]
    async fn test_messages_round_trip_in_order() {
        let store = seeded_store(&["chat"]).await;
        let session_id = store.load().await[0].id.clone();

        let first = StoredMessage::new(&session_id, MessageRole::User, "question");
        let second = StoredMessage::new(&session_id, MessageRole::Assistant, "answer");
        SessionStore::append_message(&store, &first).await.unwrap();
        SessionStore::append_message(&store, &second).await.unwrap();

        let messages = store.messages_for(&session_id).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "question");
        assert_eq!(messages[1].content, "answer");
    }

    #[tokio::test]
    async fn test_messages_for_unknown_session_is_empty() {
        let store = make_store();
        assert!(store.messages_for("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_messages_load_as_empty() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.set(MESSAGES_KEY, "{broken").await.unwrap();

        let store = LocalSessionStore::new(kv);
        assert!(store.messages_for("any").await.is_empty());
    }

    #[tokio::test]
    async fn test_messages_only_touch_their_session() {
        let store = seeded_store(&["a", "b"]).await;
        let sessions = store.load().await;
        let (sa, sb) = (&sessions[0].id, &sessions[1].id);

        SessionStore::append_message(&store, &StoredMessage::new(sa, MessageRole::User, "for a"))
            .await
            .unwrap();
        SessionStore::append_message(&store, &StoredMessage::new(sb, MessageRole::User, "for b"))
            .await
            .unwrap();

        store.remove_messages_for(sa).await.unwrap();
        assert!(store.messages_for(sa).await.is_empty());
        assert_eq!(store.messages_for(sb).await.len(), 1);
    }

    // ---- trait surface ----

    #[tokio::test]
    async fn test_create_session_persists_and_returns() {
        let store = make_store();
        let created = store
            .create_session("ignored-owner", "fresh", SessionMeta::default())
            .await
            .unwrap();

        let listed = store.list_sessions("other-owner").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].title, "fresh");
    }

    #[tokio::test]
    async fn test_create_session_keeps_meta() {
        let store = make_store();
        let meta = SessionMeta::new(
            Some("growth".into()),
            Some("Growth plan".into()),
            Some("growth-01".into()),
        );
        let created = store
            .create_session("", "tagged", meta.clone())
            .await
            .unwrap();
        assert_eq!(created.meta(), meta);

        let listed = store.list_sessions("").await.unwrap();
        assert_eq!(listed[0].meta(), meta);
    }

    #[tokio::test]
    async fn test_find_session_by_id() {
        let store = seeded_store(&["wanted", "other"]).await;
        let id = store.load().await[0].id.clone();

        let found = store.find_session(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.find_session("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_session_updates_title() {
        let store = seeded_store(&["before"]).await;
        let id = store.load().await[0].id.clone();

        store.rename_session(&id, "after").await.unwrap();
        assert_eq!(store.load().await[0].title, "after");
    }

    #[tokio::test]
    async fn test_rename_missing_session_errors() {
        let store = make_store();
        let result = store.rename_session("ghost", "title").await;
        assert!(matches!(result, Err(ConferError::Store(_))));
    }

    // ---- concurrent mutations ----
    //
    // The file-backed store yields to the scheduler at every IO point, so
    // joined operations genuinely interleave.

    #[tokio::test]
    async fn test_joined_deletes_of_distinct_sessions_both_apply() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir);
        let a = store
            .create_session("", "first", SessionMeta::default())
            .await
            .unwrap();
        let b = store
            .create_session("", "second", SessionMeta::default())
            .await
            .unwrap();
        let keeper = store
            .create_session("", "keeper", SessionMeta::default())
            .await
            .unwrap();

        let (ra, rb) = tokio::join!(store.delete_session(&a.id), store.delete_session(&b.id));
        ra.unwrap();
        rb.unwrap();

        let left = store.load().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, keeper.id);
    }

    #[tokio::test]
    async fn test_joined_appends_to_distinct_sessions_keep_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(&dir);
        let a = store
            .create_session("", "a", SessionMeta::default())
            .await
            .unwrap();
        let b = store
            .create_session("", "b", SessionMeta::default())
            .await
            .unwrap();

        let ma = StoredMessage::new(&a.id, MessageRole::User, "for a");
        let mb = StoredMessage::new(&b.id, MessageRole::User, "for b");
        let (ra, rb) = tokio::join!(
            SessionStore::append_message(&store, &ma),
            SessionStore::append_message(&store, &mb)
        );
        ra.unwrap();
        rb.unwrap();

        assert_eq!(store.messages_for(&a.id).await.len(), 1);
        assert_eq!(store.messages_for(&b.id).await.len(), 1);
    }

    // ---- persistence across instances ----

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id;
        {
            let store = file_store(&dir);
            let created = store
                .create_session("", "durable", SessionMeta::default())
                .await
                .unwrap();
            id = created.id;
        }

        let reopened = file_store(&dir);
        let sessions = reopened.load().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].title, "durable");
    }
}
