use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Namespace key under which the one durable session record is stored.
pub const SESSION_RECORD_KEY: &str = "vivah_session";

/// Durable device storage: a sqlite-backed key/value table holding at most
/// a handful of JSON records, of which the session record is the only one
/// the client currently writes.
#[derive(Clone)]
pub struct SessionStorage {
    pool: Pool<Sqlite>,
}

impl SessionStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_records_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_records_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_records (
                namespace  TEXT PRIMARY KEY,
                payload    TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure device_records table exists")?;
        Ok(())
    }

    pub async fn load_record(&self, namespace: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT payload FROM device_records WHERE namespace = ?")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn save_record(&self, namespace: &str, payload: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO device_records (namespace, payload, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(namespace) DO UPDATE
             SET payload = excluded.payload, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(namespace)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_record(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM device_records WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn sqlite_url_for_data_dir(base_dir: &Path) -> String {
        format!(
            "sqlite://{}",
            base_dir.join("client_state.sqlite3").display()
        )
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_storage() -> (tempfile::TempDir, SessionStorage) {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = SessionStorage::sqlite_url_for_data_dir(dir.path());
        let storage = SessionStorage::new(&url).await.expect("storage");
        (dir, storage)
    }

    #[tokio::test]
    async fn record_round_trips_and_overwrites() {
        let (_dir, storage) = temp_storage().await;

        assert_eq!(storage.load_record(SESSION_RECORD_KEY).await.expect("load"), None);

        storage
            .save_record(SESSION_RECORD_KEY, r#"{"token":"T"}"#)
            .await
            .expect("save");
        assert_eq!(
            storage.load_record(SESSION_RECORD_KEY).await.expect("load"),
            Some(r#"{"token":"T"}"#.to_string())
        );

        storage
            .save_record(SESSION_RECORD_KEY, r#"{"token":"U"}"#)
            .await
            .expect("overwrite");
        assert_eq!(
            storage.load_record(SESSION_RECORD_KEY).await.expect("load"),
            Some(r#"{"token":"U"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let (_dir, storage) = temp_storage().await;
        storage
            .save_record(SESSION_RECORD_KEY, "{}")
            .await
            .expect("save");
        storage.delete_record(SESSION_RECORD_KEY).await.expect("delete");
        assert_eq!(storage.load_record(SESSION_RECORD_KEY).await.expect("load"), None);
    }

    #[tokio::test]
    async fn record_survives_reopening_the_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = SessionStorage::sqlite_url_for_data_dir(dir.path());

        {
            let storage = SessionStorage::new(&url).await.expect("storage");
            storage
                .save_record(SESSION_RECORD_KEY, r#"{"token":"persisted"}"#)
                .await
                .expect("save");
        }

        let reopened = SessionStorage::new(&url).await.expect("reopen");
        assert_eq!(
            reopened.load_record(SESSION_RECORD_KEY).await.expect("load"),
            Some(r#"{"token":"persisted"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn creates_parent_directory_for_nested_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("data").join("inner");
        let url = SessionStorage::sqlite_url_for_data_dir(&nested);
        let storage = SessionStorage::new(&url).await.expect("storage");
        storage.health_check().await.expect("ping");
        assert!(nested.exists());
    }
}
