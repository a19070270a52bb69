// handlers/protected/process.rs - /api/process handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::{AccessLevel, Permission};
use crate::database::models::{PaginatedList, Process};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ProcessDraft;

use super::required_param;

const MANAGE: &[Permission] = &[Permission::ManageProcess];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitQuery {
    pub unit_id: Option<i64>,
}

/// POST /api/process/new - Owner unit plus optional related units
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<ProcessDraft>,
) -> ApiResult<Process> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::created(state.processes().create(user.company_id, draft).await?))
}

/// GET /api/process?unitId=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UnitQuery>,
) -> ApiResult<PaginatedList<Process>> {
    let unit_id = required_param(query.unit_id, "unitId")?;
    Ok(ApiResponse::success(
        state.processes().list_by_unit(user.company_id, unit_id).await?,
    ))
}

/// DELETE /api/process/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Process> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.processes().delete(user.company_id, id).await?))
}
