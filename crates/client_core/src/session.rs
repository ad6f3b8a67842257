use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The authenticated identity of the device user. Either fully
/// unauthenticated (all fields absent) or carrying at minimum a token and
/// user id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub photo_version: Option<i64>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user_id.is_some()
    }
}

/// Seam to the durable device record. Implementations must not assume the
/// record exists; `load` returns `None` for a fresh device.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, payload: &str) -> Result<()>;
    async fn delete(&self) -> Result<()>;
}

/// Stand-in when no durable storage is wired up; every method no-ops, so
/// the session lives only as long as the process.
pub struct EphemeralSessionPersistence;

#[async_trait]
impl SessionPersistence for EphemeralSessionPersistence {
    async fn load(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn save(&self, _payload: &str) -> Result<()> {
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        Ok(())
    }
}

/// Process-wide holder of the authentication state. One instance per
/// process, injected into the HTTP layer and controllers; reads are
/// synchronous snapshots, mutations persist asynchronously and swallow
/// persistence failures (in-memory state is the fallback source of truth).
pub struct SessionStore {
    current: Mutex<Session>,
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionStore {
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(Session::default()),
            persistence,
        })
    }

    pub fn ephemeral() -> Arc<Self> {
        Self::new(Arc::new(EphemeralSessionPersistence))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Synchronous read of the in-memory session. No I/O, never fails.
    pub fn get_session(&self) -> Session {
        self.lock().clone()
    }

    /// Replaces the in-memory session wholesale (absent fields become
    /// `None`, not stale leftovers) and persists the new value.
    pub async fn set_session(&self, fields: Session) {
        let snapshot = {
            let mut current = self.lock();
            *current = fields;
            current.clone()
        };
        self.persist(&snapshot).await;
    }

    /// Rehydrates from the durable record. Memory is replaced only when the
    /// record both loads and parses; otherwise the in-memory session is
    /// left untouched. Returns the resulting session either way.
    pub async fn load_session_from_storage(&self) -> Session {
        match self.persistence.load().await {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(stored) => {
                    *self.lock() = stored.clone();
                    stored
                }
                Err(err) => {
                    warn!("session: ignoring corrupt durable record: {err}");
                    self.get_session()
                }
            },
            Ok(None) => self.get_session(),
            Err(err) => {
                warn!("session: durable load failed: {err}");
                self.get_session()
            }
        }
    }

    /// Resets to the unauthenticated state and best-effort deletes the
    /// durable record.
    pub async fn clear_session(&self) {
        *self.lock() = Session::default();
        if let Err(err) = self.persistence.delete().await {
            warn!("session: durable delete failed: {err}");
        }
    }

    /// Advances the photo cache-bust version, defaulting to wall-clock
    /// milliseconds, and persists the session. Returns the new version.
    pub async fn set_photo_version(&self, version: Option<i64>) -> i64 {
        let resolved = version.unwrap_or_else(|| Utc::now().timestamp_millis());
        let snapshot = {
            let mut current = self.lock();
            current.photo_version = Some(resolved);
            current.clone()
        };
        self.persist(&snapshot).await;
        resolved
    }

    /// Appends `pv=<version>` to a resource URL, joining with `&` when a
    /// query string is already present. Returns the input unchanged when
    /// the URL or the version is absent, or when the same version is
    /// already applied.
    pub fn with_photo_version(&self, url: Option<&str>) -> Option<String> {
        let url = url?;
        if url.is_empty() {
            return Some(url.to_string());
        }
        let Some(version) = self.lock().photo_version else {
            return Some(url.to_string());
        };
        let marker = format!("pv={version}");
        if url.contains(&format!("?{marker}")) || url.contains(&format!("&{marker}")) {
            return Some(url.to_string());
        }
        let joiner = if url.contains('?') { '&' } else { '?' };
        Some(format!("{url}{joiner}{marker}"))
    }

    async fn persist(&self, session: &Session) {
        let raw = match serde_json::to_string(session) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("session: failed to serialize durable record: {err}");
                return;
            }
        };
        if let Err(err) = self.persistence.save(&raw).await {
            warn!("session: durable write failed: {err}");
        }
    }
}
