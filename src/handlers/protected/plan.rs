// handlers/protected/plan.rs - /api/plan-risk handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::app::AppState;
use crate::auth::{AccessLevel, Permission};
use crate::database::models::{PaginatedList, PlanRisk};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{PlanDraft, PlanUpdate};

const MANAGE: &[Permission] = &[Permission::ManagePlanRisk];

/// POST /api/plan-risk/new - Create a plan for the caller's company
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<PlanDraft>,
) -> ApiResult<PlanRisk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    let plan = state.plans().create(user.company_id, draft).await?;
    Ok(ApiResponse::created(plan))
}

/// GET /api/plan-risk - Plans of the caller's company
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<PaginatedList<PlanRisk>> {
    Ok(ApiResponse::success(state.plans().list(user.company_id).await?))
}

/// GET /api/plan-risk/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<PlanRisk> {
    Ok(ApiResponse::success(state.plans().get(user.company_id, id).await?))
}

/// PUT /api/plan-risk - Rename or describe a plan
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<PlanUpdate>,
) -> ApiResult<PlanRisk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.plans().update(user.company_id, update).await?))
}

/// DELETE /api/plan-risk/:id - Refused while the plan still has units
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<PlanRisk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.plans().delete(user.company_id, id).await?))
}
