use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::Category;

/// Local mirror of remote attachments, one flat directory per category
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Whether a regular file with this name is already mirrored.
    /// Access errors count as "not present".
    async fn exists(&self, category: Category, file_name: &str) -> bool;

    /// Write `data` under `file_name`, creating the directory if needed
    /// and overwriting any existing file.
    async fn put(&self, category: Category, file_name: &str, data: Bytes) -> Result<()>;

    /// Absolute location a file would be written to
    fn path_for(&self, category: Category, file_name: &str) -> PathBuf;
}
