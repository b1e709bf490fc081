//! On-disk face dataset.
//!
//! Each registration writes two files named `<user_id>_<millis>`: the JPEG
//! preview (`.jpg`) and the grayscale pixel vector as a JSON array (`.json`).
//! Only the file names are stored in the database.

use crate::StoreError;
use facekit_core::PixelVector;
use std::path::{Component, Path, PathBuf};

/// File names written for one registered face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceFiles {
    pub face_file: String,
    pub vector_file: String,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the dataset directory if it does not exist.
    pub async fn ensure(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a face preview and its pixel vector.
    pub async fn write_face(
        &self,
        user_id: i64,
        preview_jpeg: &[u8],
        vector: &PixelVector,
    ) -> Result<FaceFiles, StoreError> {
        // Two registrations in the same millisecond must not share a name.
        let mut stamp = chrono::Utc::now().timestamp_millis();
        while tokio::fs::try_exists(self.root.join(format!("{user_id}_{stamp}.jpg"))).await? {
            stamp += 1;
        }
        let files = FaceFiles {
            face_file: format!("{user_id}_{stamp}.jpg"),
            vector_file: format!("{user_id}_{stamp}.json"),
        };

        tokio::fs::write(self.root.join(&files.face_file), preview_jpeg).await?;
        let json = serde_json::to_vec(vector)?;
        tokio::fs::write(self.root.join(&files.vector_file), json).await?;

        tracing::debug!(
            user_id,
            face = %files.face_file,
            vector = %files.vector_file,
            "face files written"
        );
        Ok(files)
    }

    /// Read a stored JPEG preview.
    pub async fn read_face(&self, file_name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(file_name)?;
        Ok(tokio::fs::read(path).await?)
    }

    /// Join a stored file name onto the root, refusing anything that is not
    /// a bare file name.
    fn resolve(&self, file_name: &str) -> Result<PathBuf, StoreError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(file_name)),
            _ => Err(StoreError::InvalidPath(file_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(dir.path().join("face_dataset"));
        dataset.ensure().await.unwrap();

        let vector = PixelVector::new(vec![0, 127, 255]);
        let files = dataset.write_face(7, b"jpegbytes", &vector).await.unwrap();

        assert!(files.face_file.starts_with("7_"));
        assert!(files.face_file.ends_with(".jpg"));
        assert_eq!(
            files.vector_file.trim_end_matches(".json"),
            files.face_file.trim_end_matches(".jpg")
        );

        assert_eq!(dataset.read_face(&files.face_file).await.unwrap(), b"jpegbytes");
        let raw = std::fs::read_to_string(dataset.root().join(&files.vector_file)).unwrap();
        assert_eq!(raw, "[0,127,255]");
    }

    #[tokio::test]
    async fn test_back_to_back_writes_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(dir.path());
        let vector = PixelVector::new(vec![1, 2, 3]);
        let first = dataset.write_face(3, b"one", &vector).await.unwrap();
        let second = dataset.write_face(3, b"two", &vector).await.unwrap();
        assert_ne!(first.face_file, second.face_file);
        assert_eq!(dataset.read_face(&first.face_file).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(dir.path());
        for bad in ["../etc/passwd", "/etc/passwd", "a/b.jpg", ""] {
            assert!(
                matches!(dataset.read_face(bad).await, Err(StoreError::InvalidPath(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::new(dir.path());
        assert!(matches!(
            dataset.read_face("1_1.jpg").await,
            Err(StoreError::Io(_))
        ));
    }
}
