use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Attachment category handled by the sync pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Photo,
    File,
}

/// Static description of where a category lives remotely and locally
#[derive(Debug)]
pub struct CategoryDescriptor {
    /// Suffix of the attachment header table, e.g. `ORGANIZACAO_FOTOS`
    pub header_table: &'static str,
    /// Stem of the `_BN` / `_REF` / `_BLB` blob tables
    pub blob_stem: &'static str,
    pub group_column: Option<&'static str>,
    pub caption_column: &'static str,
    pub default_extension: &'static str,
    /// Local table indexing mirrored attachments
    pub index_table: &'static str,
}

const PHOTO: CategoryDescriptor = CategoryDescriptor {
    header_table: "FOTOS",
    blob_stem: "FOTO",
    group_column: Some("GRUPO"),
    caption_column: "OBS",
    default_extension: "jpg",
    index_table: "organization_photos",
};

const FILE: CategoryDescriptor = CategoryDescriptor {
    header_table: "FILE",
    blob_stem: "ARQUIVO",
    group_column: None,
    caption_column: "OBS",
    default_extension: "pdf",
    index_table: "organization_files",
};

impl Category {
    pub const ALL: [Category; 2] = [Category::Photo, Category::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::File => "file",
        }
    }

    pub fn descriptor(&self) -> &'static CategoryDescriptor {
        match self {
            Category::Photo => &PHOTO,
            Category::File => &FILE,
        }
    }
}

/// One binary attachment as seen in the remote ODK store
#[derive(Debug, Clone)]
pub struct RemoteBlobRecord {
    pub external_uri: String,
    pub parent_uri: String,
    pub group_label: Option<String>,
    pub observation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub payload: Bytes,
    pub size_bytes: i64,
    pub file_name: String,
}

impl RemoteBlobRecord {
    /// Pick the local file name for a blob.
    ///
    /// Only the final component of the remote path is kept so a blob can never
    /// be written outside the mirror directory. Without a usable name we fall
    /// back to `<epoch-millis>.<ext>`.
    pub fn derive_file_name(
        remote_path: Option<&str>,
        created_at: DateTime<Utc>,
        default_extension: &str,
    ) -> String {
        let candidate = remote_path
            .map(|p| p.trim().replace('\\', "/"))
            .and_then(|p| {
                Path::new(&p)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_string())
            })
            .filter(|n| !n.is_empty() && n != "." && n != "..");

        candidate.unwrap_or_else(|| {
            format!("{}.{}", created_at.timestamp_millis(), default_extension)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Existing,
    Downloaded,
    Error,
}

/// One line of a sync run's audit trail
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDetailEntry {
    pub external_uri: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of one per-organization sync invocation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunResult {
    pub success: bool,
    pub total_remote: usize,
    pub already_existing: usize,
    pub downloaded: usize,
    pub errors: usize,
    pub details: Vec<SyncDetailEntry>,
    pub message: String,
}

impl SyncRunResult {
    /// A run that did nothing, successfully
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    /// A run that failed before processing any blob
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Per-organization row of a fleet run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSyncSummary {
    pub id: i64,
    pub name: String,
    pub external_id: Option<String>,
    pub skipped: bool,
    pub photos_downloaded: usize,
    pub files_downloaded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_error: Option<String>,
}

/// Outcome of a full-fleet run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSyncResult {
    pub total_organizations: usize,
    pub organizations_with_external_id: usize,
    pub organizations_without_external_id: usize,
    pub total_photos_downloaded: usize,
    pub total_files_downloaded: usize,
    pub successful_organizations: usize,
    pub error_count: usize,
    pub per_organization: Vec<OrganizationSyncSummary>,
}

/// Read-only fleet diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total_organizations: i64,
    pub with_external_id: i64,
    pub without_external_id: i64,
    pub with_photos: i64,
    pub without_photos: i64,
    pub with_files: i64,
    pub without_files: i64,
}

/// A remote blob as listed by the "available" endpoints, without its bytes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableBlob {
    pub external_uri: String,
    pub parent_uri: String,
    pub group_label: Option<String>,
    pub observation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: i64,
    pub file_name: String,
    pub content_type: String,
    pub already_synced: bool,
}

impl AvailableBlob {
    pub fn new(record: &RemoteBlobRecord, already_synced: bool) -> Self {
        Self {
            external_uri: record.external_uri.clone(),
            parent_uri: record.parent_uri.clone(),
            group_label: record.group_label.clone(),
            observation: record.observation.clone(),
            created_at: record.created_at,
            size_bytes: record.size_bytes,
            file_name: record.file_name.clone(),
            content_type: mime_guess::from_path(&record.file_name)
                .first_or_octet_stream()
                .to_string(),
            already_synced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn test_file_name_from_remote_path() {
        let name = RemoteBlobRecord::derive_file_name(Some("1699999.jpg"), created(), "jpg");
        assert_eq!(name, "1699999.jpg");
    }

    #[test]
    fn test_file_name_strips_directories() {
        let name = RemoteBlobRecord::derive_file_name(Some("../../etc/passwd"), created(), "jpg");
        assert_eq!(name, "passwd");
        let name = RemoteBlobRecord::derive_file_name(Some("media\\foto.png"), created(), "jpg");
        assert_eq!(name, "foto.png");
    }

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(
            RemoteBlobRecord::derive_file_name(None, created(), "jpg"),
            "1700000000123.jpg"
        );
        assert_eq!(
            RemoteBlobRecord::derive_file_name(Some("  "), created(), "pdf"),
            "1700000000123.pdf"
        );
        assert_eq!(
            RemoteBlobRecord::derive_file_name(Some(".."), created(), "pdf"),
            "1700000000123.pdf"
        );
    }

    #[test]
    fn test_run_result_serializes_camel_case() {
        let value = serde_json::to_value(SyncRunResult::empty("nothing found")).unwrap();
        assert_eq!(value["totalRemote"], 0);
        assert_eq!(value["alreadyExisting"], 0);
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_available_blob_guesses_content_type() {
        let record = RemoteBlobRecord {
            external_uri: "uuid:1".into(),
            parent_uri: "uuid:org".into(),
            group_label: None,
            observation: None,
            created_at: created(),
            payload: Bytes::from_static(b"%PDF"),
            size_bytes: 4,
            file_name: "relatorio.pdf".into(),
        };
        let blob = AvailableBlob::new(&record, true);
        assert_eq!(blob.content_type, "application/pdf");
        assert!(blob.already_synced);
    }
}
