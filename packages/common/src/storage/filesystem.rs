use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::traits::ObjectStore;

/// Filesystem-backed object store.
///
/// Objects live at `{base_path}/{key}`, with writes staged through a `.tmp`
/// directory and renamed into place so readers never observe partial files.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Compute the filesystem path for a given key.
    ///
    /// Rejects empty keys, absolute paths, and any `.`/`..` component so a
    /// hostile repository path can never escape the base directory.
    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }

        let path = Path::new(key);
        for component in path.components() {
            match component {
                Component::Normal(part) if !part.is_empty() => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "key '{key}' contains a disallowed path component"
                    )));
                }
            }
        }

        Ok(self.base_path.join(path))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    fn count_files(dir: &Path) -> Result<u64, std::io::Error> {
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                count += Self::count_files(&entry.path())?;
            } else {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let object_path = self.object_path(key)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::read(&object_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(key)?;
        Ok(fs::try_exists(&object_path).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError> {
        let prefix_path = self.object_path(prefix)?;
        match fs::metadata(&prefix_path).await {
            Ok(meta) if meta.is_dir() => {
                let count = tokio::task::spawn_blocking({
                    let prefix_path = prefix_path.clone();
                    move || -> Result<u64, std::io::Error> {
                        let count = Self::count_files(&prefix_path)?;
                        std::fs::remove_dir_all(&prefix_path)?;
                        Ok(count)
                    }
                })
                .await
                .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;
                Ok(count)
            }
            Ok(_) => {
                // A bare file under the prefix key; remove it alone.
                fs::remove_file(&prefix_path).await?;
                Ok(1)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
