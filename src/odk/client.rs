use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::OdkConfig;
use crate::error::{AppError, Result};
use crate::models::{ConnectionProfile, RemoteBlobRecord};
use crate::odk::RemoteQuery;

/// Runs a rendered `RemoteQuery` against the remote store
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn fetch_blobs(
        &self,
        profile: &ConnectionProfile,
        query: &RemoteQuery,
    ) -> Result<Vec<RemoteBlobRecord>>;
}

/// Columns selected by `RemoteQuery::sql`
#[derive(Debug, Clone)]
pub struct RawBlobRow {
    pub uri: String,
    pub parent_uri: String,
    pub group_label: Option<String>,
    pub observation: Option<String>,
    pub created_at: NaiveDateTime,
    pub payload: Vec<u8>,
    pub size_bytes: i64,
    pub file_path: Option<String>,
}

impl RawBlobRow {
    fn from_row(row: &PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            uri: row.try_get("uri")?,
            parent_uri: row.try_get("parent_uri")?,
            group_label: row.try_get("group_label")?,
            observation: row.try_get("observation")?,
            created_at: row.try_get("created_at")?,
            payload: row.try_get("payload")?,
            size_bytes: row.try_get("size_bytes")?,
            file_path: row.try_get("file_path")?,
        })
    }

    pub fn into_record(self, default_extension: &str) -> RemoteBlobRecord {
        let created_at = self.created_at.and_utc();
        let file_name = RemoteBlobRecord::derive_file_name(
            self.file_path.as_deref(),
            created_at,
            default_extension,
        );
        RemoteBlobRecord {
            external_uri: self.uri,
            parent_uri: self.parent_uri,
            group_label: self.group_label,
            observation: self.observation,
            created_at,
            payload: Bytes::from(self.payload),
            size_bytes: self.size_bytes,
            file_name,
        }
    }
}

/// Direct PostgreSQL connection to the ODK Aggregate database
pub struct PgRemoteExecutor {
    /// Profile name -> (endpoint key the pool was opened with, pool)
    pools: Mutex<HashMap<String, (String, PgPool)>>,
    timeout: Duration,
    max_connections: u32,
}

impl PgRemoteExecutor {
    pub fn new(config: &OdkConfig) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            timeout: config.query_timeout(),
            max_connections: config.max_connections.max(1),
        }
    }

    /// Pools are created lazily and reused while the profile's endpoint is
    /// unchanged. An edited profile (host, credentials) gets a fresh pool and
    /// the stale one is closed.
    fn pool_for(&self, profile: &ConnectionProfile) -> Result<PgPool> {
        let key = profile.endpoint_key();
        let mut pools = self
            .pools
            .lock()
            .map_err(|_| AppError::Internal("Remote pool cache poisoned".to_string()))?;

        if let Some((cached_key, pool)) = pools.get(&profile.name) {
            if *cached_key == key {
                return Ok(pool.clone());
            }
        }

        let port = u16::try_from(profile.port).map_err(|_| {
            AppError::Configuration(format!(
                "Invalid port {} in connection profile '{}'",
                profile.port, profile.name
            ))
        })?;
        let options = PgConnectOptions::new()
            .host(&profile.host)
            .port(port)
            .database(&profile.database_name)
            .username(&profile.username)
            .password(&profile.password)
            .application_name("pinovara-sync");
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.timeout)
            .connect_lazy_with(options);

        tracing::info!("Created remote pool for profile {:?}", profile);
        if let Some((_, stale)) = pools.insert(profile.name.clone(), (key, pool.clone())) {
            tracing::info!("Connection profile '{}' changed, closing old pool", profile.name);
            tokio::spawn(async move { stale.close().await });
        }
        Ok(pool)
    }

    /// Close every cached pool
    pub async fn close(&self) {
        let pools: Vec<PgPool> = match self.pools.lock() {
            Ok(mut pools) => pools.drain().map(|(_, (_, p))| p).collect(),
            Err(_) => return,
        };
        for pool in pools {
            pool.close().await;
        }
    }
}

#[async_trait]
impl RemoteExecutor for PgRemoteExecutor {
    async fn fetch_blobs(
        &self,
        profile: &ConnectionProfile,
        query: &RemoteQuery,
    ) -> Result<Vec<RemoteBlobRecord>> {
        let pool = self.pool_for(profile)?;
        let sql = query.sql();

        let rows = tokio::time::timeout(
            self.timeout,
            sqlx::query(&sql).bind(&query.external_id).fetch_all(&pool),
        )
        .await
        .map_err(|_| {
            AppError::RemoteConnection(format!(
                "{} query on '{}' timed out after {:?}",
                query.generation.name, query.profile, self.timeout
            ))
        })?
        .map_err(|e| {
            AppError::RemoteConnection(format!(
                "{} query on '{}' failed: {}",
                query.generation.name, query.profile, e
            ))
        })?;

        let extension = query.category.descriptor().default_extension;
        rows.iter()
            .map(|row| {
                RawBlobRow::from_row(row)
                    .map(|raw| raw.into_record(extension))
                    .map_err(|e| {
                        AppError::RemoteConnection(format!("Unexpected remote row shape: {}", e))
                    })
            })
            .collect()
    }
}
