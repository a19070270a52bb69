// handlers/protected/company.rs - Company backup export and restore

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};

use crate::app::AppState;
use crate::auth::{AccessLevel, Permission};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::backup_service::RESTORE_SUCCESS;

/// GET /company/export - Download every plan of the caller's company
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    user.require(AccessLevel::CompanyAdmin, &[Permission::ExportData])?;
    let (bytes, file_name) = state.backups().export(user.company_id).await?;
    tracing::info!("User {} exported company {} as {}", user.user_id, user.company_id, file_name);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// POST /company/restore - Raw body is a blob produced by export
pub async fn restore(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<&'static str> {
    user.require(AccessLevel::CompanyAdmin, &[Permission::RestoreData])?;
    let limit = state.config.api.restore_upload_limit_bytes;

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(format!("Arquivo excede o tamanho máximo permitido de {} bytes", limit))
        } else {
            ApiError::bad_request(rejection.body_text())
        }
    })?;

    let summary = state.backups().restore(user.company_id, &body, limit).await?;
    tracing::info!(
        "User {} restored company {} ({} plan(s))",
        user.user_id,
        user.company_id,
        summary.plans
    );
    Ok(ApiResponse::success(RESTORE_SUCCESS))
}
