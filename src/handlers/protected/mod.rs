// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `jwt_auth_middleware`, which injects `AuthUser`.
// Handlers check the access rule first, then hand off to a service scoped to
// the caller's company.

pub mod company;
pub mod plan;
pub mod process;
pub mod risk;
pub mod unit;

use crate::error::ApiError;

/// Query parameter that must be present
pub(crate) fn required_param(value: Option<i64>, name: &str) -> Result<i64, ApiError> {
    value.ok_or_else(|| ApiError::bad_request(format!("Parâmetro obrigatório ausente: {}", name)))
}

/// Comma-separated id list such as `3,7,12`; blank entries are skipped
pub(crate) fn parse_id_list(raw: &str, name: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>()
                .map_err(|_| ApiError::bad_request(format!("Identificador inválido em {}: {}", name, item)))
        })
        .collect()
}
