//! Async handle to the SQLite database.
//!
//! The connection lives on a dedicated thread owned by `tokio-rusqlite`;
//! every method ships a closure over to it and awaits the reply.

use crate::db;
use crate::types::{FaceRecord, FaceWithUser, NewFace, NewSummary, Stats, SummaryRecord, User};
use crate::StoreError;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Clone-safe handle to the face/summary database.
#[derive(Clone)]
pub struct FaceStore {
    conn: Connection,
}

impl FaceStore {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(path).await?;
        let store = Self::init(conn).await?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(store)
    }

    /// In-memory database, for tests and throwaway runs.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().await?).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(db::migrate(conn)?)).await?;
        Ok(Self { conn })
    }

    pub async fn get_or_create_user(&self, name: &str) -> Result<User, StoreError> {
        let name = name.to_string();
        Ok(self
            .conn
            .call(move |conn| Ok(db::get_or_create_user(conn, &name)?))
            .await?)
    }

    pub async fn create_face(&self, face: NewFace) -> Result<FaceRecord, StoreError> {
        Ok(self
            .conn
            .call(move |conn| Ok(db::create_face(conn, &face)?))
            .await?)
    }

    pub async fn all_faces(&self) -> Result<Vec<FaceWithUser>, StoreError> {
        Ok(self.conn.call(|conn| Ok(db::all_faces(conn)?)).await?)
    }

    pub async fn create_summary(&self, summary: NewSummary) -> Result<SummaryRecord, StoreError> {
        Ok(self
            .conn
            .call(move |conn| Ok(db::create_summary(conn, &summary)?))
            .await?)
    }

    pub async fn all_summaries(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        Ok(self.conn.call(|conn| Ok(db::all_summaries(conn)?)).await?)
    }

    pub async fn stats(&self) -> Result<Stats, StoreError> {
        Ok(self.conn.call(|conn| Ok(db::stats(conn)?)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_register_flow() {
        let store = FaceStore::open_in_memory().await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_faces, 0);

        let ada = store.get_or_create_user("ada").await.unwrap();
        let again = store.get_or_create_user("ada").await.unwrap();
        assert_eq!(ada.id, again.id);

        store
            .create_face(NewFace {
                user_id: ada.id,
                face_path: Some("1_1.jpg".into()),
                vector_path: Some("1_1.json".into()),
            })
            .await
            .unwrap();

        let faces = store.all_faces().await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].user.name, "ada");
        assert_eq!(store.stats().await.unwrap().total_faces, 1);
    }

    #[tokio::test]
    async fn test_store_summaries() {
        let store = FaceStore::open_in_memory().await.unwrap();
        store
            .create_summary(NewSummary {
                original_text: "a b c".into(),
                summary: "a".into(),
                model_used: "m".into(),
                summary_style: "brief".into(),
                word_count: 1,
            })
            .await
            .unwrap();
        let all = store.all_summaries().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].summary_style.as_deref(), Some("brief"));
        assert_eq!(store.stats().await.unwrap().total_summaries, 1);
    }

    #[tokio::test]
    async fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("facekit.db");
        let store = FaceStore::open(&path).await.unwrap();
        store.get_or_create_user("ada").await.unwrap();
        assert!(path.exists());
    }
}
