//! Filesystem object store for offline runs

use super::{ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Stores objects under `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Destination path of an object
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(bucket).join(key);
        let contained = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !contained {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let final_path = self.object_path(bucket, key)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Write beside the target, then rename so readers never see a partial file.
        let mut temp_path = final_path.clone().into_os_string();
        temp_path.push(".part");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, &body).await.map_err(io_err)?;
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }
        Ok(())
    }
}
