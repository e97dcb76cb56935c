use async_trait::async_trait;
use std::sync::Arc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    AvailableBlob, Category, RemoteBlobRecord, SyncDetailEntry, SyncRunResult, SyncStatus,
};
use crate::odk::BlobLocator;
use crate::services::OrganizationService;
use crate::storage::MirrorStore;

/// Syncs one organization's attachments of one category
#[async_trait]
pub trait OrganizationSync: Send + Sync {
    /// Never fails for remote or per-item problems; those are reported in the
    /// result. Only a local database failure comes back as `Err`.
    async fn sync_organization(
        &self,
        organization_id: i64,
        category: Category,
    ) -> Result<SyncRunResult>;
}

/// Photo and document sync pipeline
pub struct MediaSyncService {
    db: Database,
    locator: BlobLocator,
    mirror: Arc<dyn MirrorStore>,
}

impl MediaSyncService {
    pub fn new(db: Database, locator: BlobLocator, mirror: Arc<dyn MirrorStore>) -> Self {
        Self {
            db,
            locator,
            mirror,
        }
    }

    /// List remote blobs for an organization, flagging those already mirrored.
    /// Nothing is downloaded.
    pub async fn list_available(
        &self,
        organization_id: i64,
        category: Category,
    ) -> Result<Vec<AvailableBlob>> {
        let org = OrganizationService::find(&self.db, organization_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Organization {} not found", organization_id))
            })?;

        let blobs = self.locator.locate(org.external_id(), category).await?;

        let mut available = Vec::with_capacity(blobs.len());
        for blob in &blobs {
            let synced = self.mirror.exists(category, &blob.file_name).await;
            available.push(AvailableBlob::new(blob, synced));
        }
        Ok(available)
    }

    /// Best-effort: the index never affects run counters
    async fn index(&self, organization_id: i64, category: Category, blob: &RemoteBlobRecord) {
        if let Err(e) =
            OrganizationService::register_attachment(&self.db, organization_id, category, blob)
                .await
        {
            tracing::warn!(
                "Failed to index {} {} for organization {}: {}",
                category.as_str(),
                blob.file_name,
                organization_id,
                e
            );
        }
    }
}

#[async_trait]
impl OrganizationSync for MediaSyncService {
    async fn sync_organization(
        &self,
        organization_id: i64,
        category: Category,
    ) -> Result<SyncRunResult> {
        let org = match OrganizationService::find(&self.db, organization_id).await? {
            Some(org) => org,
            None => {
                return Ok(SyncRunResult::failed(format!(
                    "Organization {} not found",
                    organization_id
                )))
            }
        };

        let Some(external_id) = org.external_id() else {
            return Ok(SyncRunResult::empty(format!(
                "Organization {} has no ODK identifier",
                organization_id
            )));
        };

        let blobs = match self.locator.locate(Some(external_id), category).await {
            Ok(blobs) => blobs,
            Err(e) => {
                tracing::error!(
                    "Failed to locate {} blobs for organization {}: {}",
                    category.as_str(),
                    organization_id,
                    e
                );
                return Ok(SyncRunResult::failed(format!(
                    "Failed to sync {}s: {}",
                    category.as_str(),
                    e
                )));
            }
        };

        if blobs.is_empty() {
            return Ok(SyncRunResult::empty(format!(
                "No {}s found in ODK",
                category.as_str()
            )));
        }

        let mut result = SyncRunResult {
            total_remote: blobs.len(),
            ..Default::default()
        };

        for blob in &blobs {
            if self.mirror.exists(category, &blob.file_name).await {
                tracing::debug!("{} already mirrored", blob.file_name);
                result.already_existing += 1;
                result.details.push(SyncDetailEntry {
                    external_uri: blob.external_uri.clone(),
                    status: SyncStatus::Existing,
                    file_name: Some(blob.file_name.clone()),
                    message: None,
                });
                self.index(org.id, category, blob).await;
                continue;
            }

            match self
                .mirror
                .put(category, &blob.file_name, blob.payload.clone())
                .await
            {
                Ok(()) => {
                    tracing::debug!("Downloaded {} ({} bytes)", blob.file_name, blob.size_bytes);
                    result.downloaded += 1;
                    result.details.push(SyncDetailEntry {
                        external_uri: blob.external_uri.clone(),
                        status: SyncStatus::Downloaded,
                        file_name: Some(blob.file_name.clone()),
                        message: Some(format!("{} bytes", blob.size_bytes)),
                    });
                    self.index(org.id, category, blob).await;
                }
                Err(e) => {
                    tracing::warn!("Failed to materialize {}: {}", blob.file_name, e);
                    result.errors += 1;
                    result.details.push(SyncDetailEntry {
                        external_uri: blob.external_uri.clone(),
                        status: SyncStatus::Error,
                        file_name: Some(blob.file_name.clone()),
                        message: Some(e.to_string()),
                    });
                }
            }
        }

        result.success = result.errors == 0;
        result.message = format!(
            "{} downloaded, {} already existing, {} error(s)",
            result.downloaded, result.already_existing, result.errors
        );
        tracing::info!(
            "Organization {} {} sync: {}",
            organization_id,
            category.as_str(),
            result.message
        );
        Ok(result)
    }
}
