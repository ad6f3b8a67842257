use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::{SessionStorage, SESSION_RECORD_KEY};

use crate::session::SessionPersistence;

/// Sqlite-backed session persistence: one JSON record under the fixed
/// namespace key.
pub struct DurableSessionStore {
    storage: SessionStorage,
}

impl DurableSessionStore {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let storage = SessionStorage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize session storage at '{database_url}'"))?;
        Ok(Arc::new(Self { storage }))
    }
}

#[async_trait]
impl SessionPersistence for DurableSessionStore {
    async fn load(&self) -> Result<Option<String>> {
        self.storage.load_record(SESSION_RECORD_KEY).await
    }

    async fn save(&self, payload: &str) -> Result<()> {
        self.storage.save_record(SESSION_RECORD_KEY, payload).await
    }

    async fn delete(&self) -> Result<()> {
        self.storage.delete_record(SESSION_RECORD_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionStore};
    use storage::SessionStorage;

    #[tokio::test]
    async fn session_survives_process_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let database_url = SessionStorage::sqlite_url_for_data_dir(dir.path());

        let persistence = DurableSessionStore::initialize(&database_url)
            .await
            .expect("persistence");
        let store = SessionStore::new(persistence);
        store
            .set_session(Session {
                token: Some("durable-token".to_string()),
                user_id: Some(42),
                email: Some("asha@example.com".to_string()),
                photo_version: None,
            })
            .await;

        // Restart: a fresh store over the same database file.
        let persistence = DurableSessionStore::initialize(&database_url)
            .await
            .expect("persistence after restart");
        let restarted = SessionStore::new(persistence);
        assert_eq!(restarted.get_session(), Session::default());

        let restored = restarted.load_session_from_storage().await;
        assert_eq!(restored.token.as_deref(), Some("durable-token"));
        assert_eq!(restored.user_id, Some(42));
        assert_eq!(restored.email.as_deref(), Some("asha@example.com"));
    }

    #[tokio::test]
    async fn clear_session_deletes_the_durable_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let database_url = SessionStorage::sqlite_url_for_data_dir(dir.path());

        let persistence = DurableSessionStore::initialize(&database_url)
            .await
            .expect("persistence");
        let store = SessionStore::new(persistence);
        store
            .set_session(Session {
                token: Some("gone-soon".to_string()),
                user_id: Some(7),
                ..Session::default()
            })
            .await;
        store.clear_session().await;

        let persistence = DurableSessionStore::initialize(&database_url)
            .await
            .expect("persistence after restart");
        let restarted = SessionStore::new(persistence);
        let restored = restarted.load_session_from_storage().await;
        assert_eq!(restored, Session::default());
    }
}
