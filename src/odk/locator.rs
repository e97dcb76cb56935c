use std::sync::Arc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Category, RemoteBlobRecord};
use crate::odk::{LegacyGeneration, RemoteExecutor, RemoteQuery, GENERATIONS};
use crate::services::ConnectionService;

/// Finds an organization's attachments in the remote store, walking the
/// legacy naming generations in priority order.
pub struct BlobLocator {
    db: Database,
    executor: Arc<dyn RemoteExecutor>,
    profile_name: String,
    generations: Vec<LegacyGeneration>,
}

impl BlobLocator {
    pub fn new(db: Database, executor: Arc<dyn RemoteExecutor>, profile_name: &str) -> Self {
        Self {
            db,
            executor,
            profile_name: profile_name.to_string(),
            generations: GENERATIONS.to_vec(),
        }
    }

    /// Locate blobs for `external_id`.
    ///
    /// Returns the rows of the first generation that has any. A generation whose
    /// query fails counts as empty; only when every generation failed is the
    /// error surfaced.
    pub async fn locate(
        &self,
        external_id: Option<&str>,
        category: Category,
    ) -> Result<Vec<RemoteBlobRecord>> {
        let external_id = match external_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(Vec::new()),
        };

        let profile = ConnectionService::active_profile(&self.db, &self.profile_name).await?;

        let mut last_error: Option<AppError> = None;
        let mut failures = 0;

        for generation in &self.generations {
            let query = RemoteQuery::new(&self.profile_name, *generation, category, external_id);
            match self.executor.fetch_blobs(&profile, &query).await {
                Ok(rows) if !rows.is_empty() => {
                    tracing::debug!(
                        "Found {} {} blob(s) for {} in generation {}",
                        rows.len(),
                        category.as_str(),
                        external_id,
                        generation.name
                    );
                    return Ok(rows);
                }
                Ok(_) => {
                    tracing::debug!(
                        "No {} blobs for {} in generation {}",
                        category.as_str(),
                        external_id,
                        generation.name
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Generation {} lookup failed for {}: {}",
                        generation.name,
                        external_id,
                        e
                    );
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failures == self.generations.len() => Err(match e {
                AppError::RemoteConnection(msg) => AppError::RemoteConnection(msg),
                other => AppError::RemoteConnection(other.to_string()),
            }),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{blob, insert_profile, FakeExecutor};

    async fn locator(executor: Arc<FakeExecutor>) -> BlobLocator {
        let db = Database::in_memory().await;
        insert_profile(&db, "odk_prod").await;
        BlobLocator::new(db, executor, "odk_prod")
    }

    #[tokio::test]
    async fn test_missing_external_id_makes_no_remote_call() {
        let executor = Arc::new(FakeExecutor::default());
        let locator = locator(executor.clone()).await;

        assert!(locator.locate(None, Category::Photo).await.unwrap().is_empty());
        assert!(locator.locate(Some("  "), Category::Photo).await.unwrap().is_empty());
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_new_generation_wins_when_it_has_rows() {
        let executor = Arc::new(
            FakeExecutor::default()
                .with_rows("ORGANIZACAO", Category::Photo, vec![blob("uuid:n1", "n1.jpg", 5)])
                .with_rows("PINOVARA", Category::Photo, vec![blob("uuid:o1", "o1.jpg", 5)]),
        );
        let locator = locator(executor.clone()).await;

        let rows = locator.locate(Some("uuid:org"), Category::Photo).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].external_uri, "uuid:n1");
        assert_eq!(executor.generations_queried(), vec!["ORGANIZACAO"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_old_generation() {
        let old = vec![blob("uuid:o1", "o1.jpg", 5), blob("uuid:o2", "o2.jpg", 7)];
        let executor = Arc::new(FakeExecutor::default().with_rows("PINOVARA", Category::File, old));
        let locator = locator(executor.clone()).await;

        let rows = locator.locate(Some("uuid:org"), Category::File).await.unwrap();
        let uris: Vec<&str> = rows.iter().map(|r| r.external_uri.as_str()).collect();
        assert_eq!(uris, vec!["uuid:o1", "uuid:o2"]);
        assert_eq!(executor.generations_queried(), vec!["ORGANIZACAO", "PINOVARA"]);
    }

    #[tokio::test]
    async fn test_failed_new_generation_still_falls_back() {
        let executor = Arc::new(
            FakeExecutor::default()
                .with_error("ORGANIZACAO", Category::Photo, "relation does not exist")
                .with_rows("PINOVARA", Category::Photo, vec![blob("uuid:o1", "o1.jpg", 5)]),
        );
        let locator = locator(executor).await;

        let rows = locator.locate(Some("uuid:org"), Category::Photo).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_everywhere_is_not_an_error() {
        let executor = Arc::new(
            FakeExecutor::default().with_error("ORGANIZACAO", Category::Photo, "boom"),
        );
        let locator = locator(executor).await;

        assert!(locator.locate(Some("uuid:org"), Category::Photo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_generations_failing_is_a_remote_error() {
        let executor = Arc::new(
            FakeExecutor::default()
                .with_error("ORGANIZACAO", Category::Photo, "connection refused")
                .with_error("PINOVARA", Category::Photo, "connection refused"),
        );
        let locator = locator(executor).await;

        let err = locator.locate(Some("uuid:org"), Category::Photo).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteConnection(_)));
    }

    #[tokio::test]
    async fn test_missing_profile_is_a_configuration_error() {
        let executor = Arc::new(FakeExecutor::default());
        let db = Database::in_memory().await;
        let locator = BlobLocator::new(db, executor.clone(), "odk_prod");

        let err = locator.locate(Some("uuid:org"), Category::Photo).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert_eq!(executor.calls(), 0);
    }
}
