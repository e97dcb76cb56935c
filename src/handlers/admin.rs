use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FleetSyncResult, SyncStats};
use crate::AppState;

/// Check if user is admin
fn require_admin(user: &CurrentUser) -> Result<()> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

/// Sync every organization against ODK
/// POST /api/admin/odk/sync-all
pub async fn sync_all(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<FleetSyncResult>>> {
    require_admin(&current_user)?;

    let guard = state
        .fleet_lock
        .clone()
        .try_lock_owned()
        .map_err(|_| AppError::Conflict("A fleet sync is already running".to_string()))?;

    tracing::info!("Fleet sync requested by user {}", current_user.id);

    // The run owns the lock and outlives the request if the client disconnects
    let odk_sync = state.odk_sync.clone();
    let run = tokio::spawn(async move {
        let _guard = guard;
        odk_sync.sync_all().await
    });
    let result = run
        .await
        .map_err(|e| AppError::Internal(format!("Fleet sync task failed: {}", e)))??;
    Ok(Json(ApiResponse::success(result)))
}

/// GET /api/admin/odk/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<SyncStats>>> {
    require_admin(&current_user)?;
    let stats = state.odk_sync.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Category, SyncRunResult, UserRole};
    use crate::services::{OdkSyncService, OrganizationSync};
    use crate::test_support::{app_state, insert_org, FakeExecutor};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Takes a while per call, so a fleet run outlasts a short request
    #[derive(Default)]
    struct SlowSync {
        finished: Mutex<Vec<(i64, Category)>>,
    }

    #[async_trait]
    impl OrganizationSync for SlowSync {
        async fn sync_organization(
            &self,
            organization_id: i64,
            category: Category,
        ) -> Result<SyncRunResult> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.finished.lock().unwrap().push((organization_id, category));
            Ok(SyncRunResult {
                success: true,
                message: "ok".to_string(),
                ..Default::default()
            })
        }
    }

    fn admin() -> CurrentUser {
        CurrentUser {
            id: "1".into(),
            email: None,
            roles: vec![UserRole::Admin],
        }
    }

    #[tokio::test]
    async fn test_fleet_run_finishes_after_client_disconnects() {
        let tmp = TempDir::new().unwrap();
        let db = Database::in_memory().await;
        for id in 1..=5 {
            insert_org(&db, id, "Cooperativa", Some("uuid:org")).await;
        }
        let slow = Arc::new(SlowSync::default());
        let mut state = app_state(&db, FakeExecutor::default(), tmp.path());
        state.odk_sync = Arc::new(OdkSyncService::new(db.clone(), slow.clone()));

        let request = sync_all(State(state.clone()), Extension(admin()));
        let dropped = tokio::time::timeout(Duration::from_millis(50), request).await;
        assert!(dropped.is_err());

        // released only when the detached run completes
        let _guard = state.fleet_lock.lock().await;
        assert_eq!(slow.finished.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_second_fleet_run_conflicts() {
        let tmp = TempDir::new().unwrap();
        let db = Database::in_memory().await;
        let state = app_state(&db, FakeExecutor::default(), tmp.path());
        let _running = state.fleet_lock.clone().lock_owned().await;

        let err = sync_all(State(state.clone()), Extension(admin()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_require_admin() {
        let mut user = CurrentUser {
            id: "1".into(),
            email: None,
            roles: vec![UserRole::User],
        };
        assert!(matches!(require_admin(&user), Err(AppError::Forbidden(_))));
        user.roles.push(UserRole::Admin);
        assert!(require_admin(&user).is_ok());
    }
}
