use std::sync::Arc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Category, FleetSyncResult, Organization, OrganizationSyncSummary, SyncStats};
use crate::services::{OrganizationService, OrganizationSync};

/// Runs the attachment sync across every organization
pub struct OdkSyncService {
    db: Database,
    syncer: Arc<dyn OrganizationSync>,
}

impl OdkSyncService {
    pub fn new(db: Database, syncer: Arc<dyn OrganizationSync>) -> Self {
        Self { db, syncer }
    }

    /// Sync photos and files for all organizations, in ascending ID order.
    ///
    /// Failure to list organizations is the only error returned; anything
    /// going wrong for a single organization is recorded on its summary row.
    pub async fn sync_all(&self) -> Result<FleetSyncResult> {
        let run_id = Uuid::new_v4();
        let organizations = OrganizationService::list_all(&self.db)
            .await
            .map_err(|e| AppError::FatalLoad(e.to_string()))?;

        tracing::info!(
            "Fleet sync {} started for {} organizations",
            run_id,
            organizations.len()
        );

        let mut fleet = FleetSyncResult {
            total_organizations: organizations.len(),
            ..Default::default()
        };

        for org in organizations {
            let (summary, failed_calls) = self.sync_one(&org).await;
            fleet.error_count += failed_calls;

            if summary.skipped {
                fleet.organizations_without_external_id += 1;
            } else {
                fleet.organizations_with_external_id += 1;
            }
            fleet.total_photos_downloaded += summary.photos_downloaded;
            fleet.total_files_downloaded += summary.files_downloaded;
            if summary.photos_downloaded > 0 || summary.files_downloaded > 0 {
                fleet.successful_organizations += 1;
            }
            fleet.per_organization.push(summary);
        }

        tracing::info!(
            "Fleet sync {} finished: {} photos, {} files downloaded, {} error(s)",
            run_id,
            fleet.total_photos_downloaded,
            fleet.total_files_downloaded,
            fleet.error_count
        );
        Ok(fleet)
    }

    /// Returns the summary row and how many category syncs returned `Err`
    async fn sync_one(&self, org: &Organization) -> (OrganizationSyncSummary, usize) {
        let mut summary = OrganizationSyncSummary {
            id: org.id,
            name: org.name.clone(),
            external_id: org.odk_uri.clone(),
            skipped: false,
            photos_downloaded: 0,
            files_downloaded: 0,
            photo_error: None,
            file_error: None,
        };

        if org.external_id().is_none() {
            tracing::debug!("Organization {} has no ODK identifier, skipping", org.id);
            summary.skipped = true;
            return (summary, 0);
        }

        let mut failed_calls = 0;
        for category in Category::ALL {
            let (downloaded, error) = match self.syncer.sync_organization(org.id, category).await {
                Ok(result) if result.success => (result.downloaded, None),
                Ok(result) => (result.downloaded, Some(result.message)),
                Err(e) => {
                    tracing::error!(
                        "{} sync failed for organization {}: {}",
                        category.as_str(),
                        org.id,
                        e
                    );
                    failed_calls += 1;
                    (0, Some(e.to_string()))
                }
            };

            match category {
                Category::Photo => {
                    summary.photos_downloaded = downloaded;
                    summary.photo_error = error;
                }
                Category::File => {
                    summary.files_downloaded = downloaded;
                    summary.file_error = error;
                }
            }
        }

        (summary, failed_calls)
    }

    /// Local-only diagnostic counts
    pub async fn stats(&self) -> Result<SyncStats> {
        OrganizationService::stats(&self.db).await
    }
}
