// handlers/protected/unit.rs - /api/unit handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::{AccessLevel, Permission};
use crate::database::models::{PaginatedList, Unit};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{DuplicationSummary, SearchParams, UnitDraft, UnitUpdate};

use super::{parse_id_list, required_param};

const MANAGE: &[Permission] = &[Permission::ManageUnit];
const EDIT: &[Permission] = &[Permission::ManageUnit, Permission::EditUnit];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanQuery {
    pub plan_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRequest {
    pub unit_ids: Vec<i64>,
    pub plan_risk_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub plan_risk_id: Option<i64>,
    pub page: Option<i64>,
    pub terms: Option<String>,
    pub ord_result: Option<i32>,
    pub limit: Option<u64>,
    /// Unit ids, comma separated (searchByKey only)
    pub itens_select: Option<String>,
    /// Subunit ids, comma separated (searchByKey only)
    pub subitens_select: Option<String>,
}

impl SearchQuery {
    /// `restrict` honours `itensSelect`/`subitensSelect`; with neither present
    /// the search is not restricted.
    fn into_params(self, restrict: bool) -> Result<SearchParams, ApiError> {
        let selected = match (restrict, self.itens_select.as_deref(), self.subitens_select.as_deref()) {
            (false, _, _) | (true, None, None) => None,
            (true, items, subitems) => {
                let mut ids = parse_id_list(items.unwrap_or_default(), "itensSelect")?;
                ids.extend(parse_id_list(subitems.unwrap_or_default(), "subitensSelect")?);
                Some(ids)
            }
        };

        Ok(SearchParams {
            plan_risk_id: required_param(self.plan_risk_id, "planRiskId")?,
            terms: self.terms,
            selected,
            ord_result: self.ord_result,
            page: self.page,
            limit: self.limit,
        })
    }
}

/// POST /api/unit/new - Create a top-level unit
pub async fn save(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<UnitDraft>,
) -> ApiResult<Unit> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::created(state.units().create_unit(user.company_id, draft).await?))
}

/// POST /api/unit/subnew - Create a subunit under a top-level unit
pub async fn save_sub(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(draft): Json<UnitDraft>,
) -> ApiResult<Unit> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::created(state.units().create_subunit(user.company_id, draft).await?))
}

/// POST /api/unit/duplicate - Copy units, their subunits and risks into another plan
pub async fn duplicate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<DuplicateRequest>,
) -> ApiResult<DuplicationSummary> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    let summary = state
        .units()
        .duplicate(user.company_id, request.plan_risk_id, &request.unit_ids)
        .await?;
    tracing::info!(
        "User {} duplicated {} unit(s) and {} risk(s) into plan {}",
        user.user_id,
        summary.units,
        summary.risks,
        request.plan_risk_id
    );
    Ok(ApiResponse::success(summary))
}

/// GET /api/unit?planId= - Top-level units of a plan
pub async fn list_units(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<PaginatedList<Unit>> {
    let plan_id = required_param(query.plan_id, "planId")?;
    Ok(ApiResponse::success(state.units().list_units(user.company_id, plan_id).await?))
}

/// GET /api/unit/:id
pub async fn get_unit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Unit> {
    Ok(ApiResponse::success(state.units().get_unit(user.company_id, id).await?))
}

/// GET /api/unit/listsub/:unit_id - Direct subunits of a unit
pub async fn list_subunits(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(unit_id): Path<i64>,
) -> ApiResult<PaginatedList<Unit>> {
    Ok(ApiResponse::success(
        state.units().list_subunits(user.company_id, unit_id).await?,
    ))
}

/// GET /api/unit/listsub?planId= - Every subunit of a plan
pub async fn list_subunits_by_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<PaginatedList<Unit>> {
    let plan_id = required_param(query.plan_id, "planId")?;
    Ok(ApiResponse::success(
        state.units().list_subunits_by_plan(user.company_id, plan_id).await?,
    ))
}

/// GET /api/unit/allByPlan?planId= - Units and subunits of a plan
pub async fn list_all_units_by_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<PaginatedList<Unit>> {
    let plan_id = required_param(query.plan_id, "planId")?;
    Ok(ApiResponse::success(
        state.units().list_all_units_by_plan(user.company_id, plan_id).await?,
    ))
}

/// DELETE /api/unit/:id
pub async fn delete_unit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Unit> {
    user.require(AccessLevel::CompanyAdmin, MANAGE)?;
    Ok(ApiResponse::success(state.units().delete_unit(user.company_id, id).await?))
}

/// PUT /api/unit - Update name, abbreviation, description and responsible user
pub async fn update_unit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<UnitUpdate>,
) -> ApiResult<Unit> {
    user.require(AccessLevel::Manager, EDIT)?;
    Ok(ApiResponse::success(state.units().update_unit(user.company_id, update).await?))
}

/// GET /api/unit/searchByKey - Term search restricted to the selected units
pub async fn search_by_key(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<PaginatedList<Unit>> {
    let params = query.into_params(true)?;
    Ok(ApiResponse::success(state.units().search(user.company_id, params).await?))
}

/// GET /api/unit/search - Term search over every unit of the plan
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<PaginatedList<Unit>> {
    let params = query.into_params(false)?;
    Ok(ApiResponse::success(state.units().search(user.company_id, params).await?))
}
