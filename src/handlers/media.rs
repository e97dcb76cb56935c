use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{AvailableBlob, Category, SyncRunResult};
use crate::services::OrganizationSync;
use crate::AppState;

async fn sync(
    state: &AppState,
    id: i64,
    category: Category,
) -> Result<Json<ApiResponse<SyncRunResult>>> {
    let result = state.media_sync.sync_organization(id, category).await?;
    Ok(Json(ApiResponse::reported(result.success, result)))
}

async fn available(
    state: &AppState,
    id: i64,
    category: Category,
) -> Result<Json<ApiResponse<Vec<AvailableBlob>>>> {
    let blobs = state.media_sync.list_available(id, category).await?;
    Ok(Json(ApiResponse::success(blobs)))
}

/// Download missing ODK photos for an organization
/// POST /api/organizacoes/:id/fotos/sync
pub async fn sync_photos(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SyncRunResult>>> {
    sync(&state, id, Category::Photo).await
}

/// GET /api/organizacoes/:id/fotos/odk-disponiveis
pub async fn available_photos(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AvailableBlob>>>> {
    available(&state, id, Category::Photo).await
}

/// Download missing ODK documents for an organization
/// POST /api/organizacoes/:id/arquivos/sync
pub async fn sync_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SyncRunResult>>> {
    sync(&state, id, Category::File).await
}

/// GET /api/organizacoes/:id/arquivos/odk-disponiveis
pub async fn available_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<AvailableBlob>>>> {
    available(&state, id, Category::File).await
}
