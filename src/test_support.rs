//! Fixtures shared by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{Config, MirrorConfig};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Category, Claims, ConnectionProfile, RemoteBlobRecord};
use crate::odk::{BlobLocator, RemoteExecutor, RemoteQuery};
use crate::services::{MediaSyncService, OdkSyncService};
use crate::storage::LocalMirror;
use crate::AppState;

pub async fn insert_org(db: &Database, id: i64, name: &str, odk_uri: Option<&str>) {
    sqlx::query("INSERT INTO organizations (id, name, odk_uri) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(odk_uri)
        .execute(db.pool())
        .await
        .unwrap();
}

pub async fn insert_profile(db: &Database, name: &str) {
    sqlx::query(
        "INSERT INTO remote_connections (name, host, port, database_name, username, password, is_active) VALUES (?, 'localhost', 5432, 'odk_aggregate', 'odk', 'odk', 1)",
    )
    .bind(name)
    .execute(db.pool())
    .await
    .unwrap();
}

pub async fn attachment_count(db: &Database, organization_id: i64, category: Category) -> i64 {
    let table = category.descriptor().index_table;
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE organization_id = ?"
    ))
    .bind(organization_id)
    .fetch_one(db.pool())
    .await
    .unwrap()
}

/// A blob whose payload is `size` bytes
pub fn blob(uri: &str, file_name: &str, size: usize) -> RemoteBlobRecord {
    RemoteBlobRecord {
        external_uri: uri.to_string(),
        parent_uri: "uuid:org".to_string(),
        group_label: None,
        observation: Some(format!("caption for {}", file_name)),
        created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        payload: Bytes::from(vec![0xAB; size]),
        size_bytes: size as i64,
        file_name: file_name.to_string(),
    }
}

pub fn mirror_in(root: &Path) -> LocalMirror {
    LocalMirror::new(&MirrorConfig {
        photos_dir: root.join("fotos").to_string_lossy().into_owned(),
        files_dir: root.join("arquivos").to_string_lossy().into_owned(),
    })
}

/// State wired like `main`, with the remote store scripted and the mirror under `root`
pub fn app_state(db: &Database, executor: FakeExecutor, root: &Path) -> AppState {
    let locator = BlobLocator::new(db.clone(), Arc::new(executor), "odk_prod");
    let mirror = Arc::new(mirror_in(root));
    let media_sync = Arc::new(MediaSyncService::new(db.clone(), locator, mirror));
    let odk_sync = Arc::new(OdkSyncService::new(db.clone(), media_sync.clone()));
    AppState {
        config: Arc::new(Config::default()),
        media_sync,
        odk_sync,
        fleet_lock: Arc::new(tokio::sync::Mutex::new(())),
    }
}

/// HS256 token for user 17 expiring `exp_offset` seconds from now
pub fn bearer_token(roles: &[&str], exp_offset: i64, secret: &str) -> String {
    let claims = Claims {
        sub: "17".into(),
        email: Some("tecnico@pinovara.org".into()),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: (Utc::now().timestamp() + exp_offset) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

type Scripted = std::result::Result<Vec<RemoteBlobRecord>, String>;

/// Scripted remote store keyed by (table prefix, category). Unscripted
/// lookups return no rows.
#[derive(Default)]
pub struct FakeExecutor {
    responses: HashMap<(&'static str, Category), Scripted>,
    calls: AtomicUsize,
    queried: Mutex<Vec<&'static str>>,
}

impl FakeExecutor {
    pub fn with_rows(
        mut self,
        prefix: &'static str,
        category: Category,
        rows: Vec<RemoteBlobRecord>,
    ) -> Self {
        self.responses.insert((prefix, category), Ok(rows));
        self
    }

    pub fn with_error(mut self, prefix: &'static str, category: Category, message: &str) -> Self {
        self.responses
            .insert((prefix, category), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn generations_queried(&self) -> Vec<&'static str> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn fetch_blobs(
        &self,
        _profile: &ConnectionProfile,
        query: &RemoteQuery,
    ) -> Result<Vec<RemoteBlobRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prefix = query.generation.table_prefix;
        self.queried.lock().unwrap().push(prefix);
        match self.responses.get(&(prefix, query.category)) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(msg)) => Err(AppError::RemoteConnection(msg.clone())),
            None => Ok(Vec::new()),
        }
    }
}
