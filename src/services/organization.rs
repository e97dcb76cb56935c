use crate::db::Database;
use crate::error::Result;
use crate::models::{Category, Organization, RemoteBlobRecord, SyncStats};

/// Read access to organizations plus the local attachment index
pub struct OrganizationService;

impl OrganizationService {
    /// Get an organization by ID
    pub async fn find(db: &Database, id: i64) -> Result<Option<Organization>> {
        let org = sqlx::query_as("SELECT id, name, odk_uri FROM organizations WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?;
        Ok(org)
    }

    /// All organizations, ascending by ID
    pub async fn list_all(db: &Database) -> Result<Vec<Organization>> {
        let orgs = sqlx::query_as("SELECT id, name, odk_uri FROM organizations ORDER BY id ASC")
            .fetch_all(db.pool())
            .await?;
        Ok(orgs)
    }

    /// Record a mirrored attachment in the local index. Re-registering the same
    /// remote URI is a no-op.
    pub async fn register_attachment(
        db: &Database,
        organization_id: i64,
        category: Category,
        record: &RemoteBlobRecord,
    ) -> Result<()> {
        let table = category.descriptor().index_table;
        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (organization_id, file_name, odk_uri, size_bytes, observation, group_label, remote_created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(odk_uri) DO NOTHING
            "#
        ))
        .bind(organization_id)
        .bind(&record.file_name)
        .bind(&record.external_uri)
        .bind(record.size_bytes)
        .bind(&record.observation)
        .bind(&record.group_label)
        .bind(record.created_at.to_rfc3339())
        .execute(db.pool())
        .await?;
        Ok(())
    }

    /// Fleet counts. Local only; never touches the remote store.
    pub async fn stats(db: &Database) -> Result<SyncStats> {
        let (total, with_external_id, with_photos, with_files): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN o.odk_uri IS NOT NULL AND TRIM(o.odk_uri) <> '' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN EXISTS (SELECT 1 FROM organization_photos p WHERE p.organization_id = o.id) THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN EXISTS (SELECT 1 FROM organization_files f WHERE f.organization_id = o.id) THEN 1 ELSE 0 END), 0)
                FROM organizations o
                "#,
            )
            .fetch_one(db.pool())
            .await?;

        Ok(SyncStats {
            total_organizations: total,
            with_external_id,
            without_external_id: total - with_external_id,
            with_photos,
            without_photos: total - with_photos,
            with_files,
            without_files: total - with_files,
        })
    }
}
