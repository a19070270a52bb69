// handlers/protected/risk.rs - /api/risk handlers, including the per-risk collections

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{AccessLevel, Permission};
use crate::database::models::{PaginatedList, Risk};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{RiskCollection, RiskDraft, RiskItem, RiskUpdate};

use super::required_param;

const MANAGE: &[Permission] = &[Permission::ManageRisk];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitQuery {
    pub unit_id: Option<i64>,
}

/// POST /api/risk/new
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<RiskDraft>,
) -> ApiResult<Risk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::created(state.risks().create(user.company_id, draft).await?))
}

/// GET /api/risk?unitId= - Risks of a unit
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<UnitQuery>,
) -> ApiResult<PaginatedList<Risk>> {
    let unit_id = required_param(query.unit_id, "unitId")?;
    Ok(ApiResponse::success(state.risks().list_by_unit(user.company_id, unit_id).await?))
}

/// GET /api/risk/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Risk> {
    Ok(ApiResponse::success(state.risks().get(user.company_id, id).await?))
}

/// PUT /api/risk
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<RiskUpdate>,
) -> ApiResult<Risk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.risks().update(user.company_id, update).await?))
}

/// DELETE /api/risk/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Risk> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.risks().delete(user.company_id, id).await?))
}

/// GET /api/risk/:id/:collection - Live items of one collection
pub async fn list_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, collection)): Path<(i64, String)>,
) -> ApiResult<PaginatedList<RiskItem>> {
    let collection: RiskCollection = collection.parse()?;
    let items = state.risks().list_items(user.company_id, id, collection).await?;
    Ok(ApiResponse::success(items.into()))
}

/// POST /api/risk/:id/:collection - Body shape depends on the collection
pub async fn add_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, collection)): Path<(i64, String)>,
    Json(body): Json<Value>,
) -> ApiResult<RiskItem> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    let collection: RiskCollection = collection.parse()?;
    let item = state.risks().add_item(user.company_id, id, collection, body).await?;
    Ok(ApiResponse::created(item))
}

/// DELETE /api/risk/:id/:collection/:item
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, collection, item)): Path<(i64, String, i64)>,
) -> ApiResult<Value> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    let collection: RiskCollection = collection.parse()?;
    state.risks().remove_item(user.company_id, id, collection, item).await?;
    Ok(ApiResponse::success(json!({ "id": item, "deleted": true })))
}
