use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::MirrorConfig;
use crate::error::{AppError, Result};
use crate::models::Category;
use crate::storage::MirrorStore;

/// Filesystem mirror
pub struct LocalMirror {
    photos_dir: PathBuf,
    files_dir: PathBuf,
}

impl LocalMirror {
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            photos_dir: PathBuf::from(&config.photos_dir),
            files_dir: PathBuf::from(&config.files_dir),
        }
    }

    fn dir(&self, category: Category) -> &Path {
        match category {
            Category::Photo => &self.photos_dir,
            Category::File => &self.files_dir,
        }
    }
}

#[async_trait]
impl MirrorStore for LocalMirror {
    async fn exists(&self, category: Category, file_name: &str) -> bool {
        let full_path = self.path_for(category, file_name);
        match fs::metadata(&full_path).await {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("Cannot stat {:?}, treating as missing: {}", full_path, e);
                false
            }
        }
    }

    /// Writes to a `.part` sibling and renames it into place, so a failed
    /// write never leaves a truncated file under the final name.
    async fn put(&self, category: Category, file_name: &str, data: Bytes) -> Result<()> {
        let dir = self.dir(category);
        fs::create_dir_all(dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to create directory {:?}: {}", dir, e))
        })?;

        let full_path = self.path_for(category, file_name);
        let part_path = dir.join(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()));

        let written = match write_part(&part_path, &data).await {
            Ok(()) => fs::rename(&part_path, &full_path).await.map_err(|e| {
                AppError::Storage(format!("Failed to move into {:?}: {}", full_path, e))
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&part_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {:?}: {}", part_path, cleanup);
                }
            }
            return Err(e);
        }

        tracing::debug!("Saved {} bytes to {:?}", data.len(), full_path);
        Ok(())
    }

    fn path_for(&self, category: Category, file_name: &str) -> PathBuf {
        self.dir(category).join(file_name)
    }
}

async fn write_part(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {:?}: {}", path, e)))?;
    file.write_all(data)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", path, e)))?;
    file.flush()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to flush {:?}: {}", path, e)))?;
    Ok(())
}
