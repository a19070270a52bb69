use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{self, AccessLevel, Claims, Permission};
use crate::error::ApiError;

pub const FORBIDDEN: &str = "Você não tem permissão para realizar esta operação.";

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub company_id: i64,
    pub email: String,
    pub access_level: AccessLevel,
    pub permissions: Vec<Permission>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            company_id: claims.company_id,
            email: claims.email,
            access_level: AccessLevel::from_value(claims.access_level),
            permissions: claims.permissions,
        }
    }
}

impl AuthUser {
    /// Allowed when the access level reaches `level` or any of `permissions` is held
    pub fn allows(&self, level: AccessLevel, permissions: &[Permission]) -> bool {
        self.access_level >= level || permissions.iter().any(|p| self.permissions.contains(p))
    }

    pub fn require(&self, level: AccessLevel, permissions: &[Permission]) -> Result<(), ApiError> {
        if self.allows(level, permissions) {
            return Ok(());
        }
        tracing::warn!(
            "User {} ({:?}) refused: requires {:?} or one of {:?}",
            self.user_id,
            self.access_level,
            level,
            permissions
        );
        Err(ApiError::forbidden(FORBIDDEN))
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let claims = auth::validate_jwt(&token, &state.config.security.jwt_secret)?;

    let auth_user = AuthUser::from(claims);
    tracing::debug!("Authenticated user {} of company {}", auth_user.user_id, auth_user.company_id);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Cabeçalho Authorization ausente".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Cabeçalho Authorization inválido".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Token JWT vazio".to_string()),
        None => Err("O cabeçalho Authorization deve usar o formato Bearer".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(level: AccessLevel, permissions: Vec<Permission>) -> AuthUser {
        AuthUser {
            user_id: 1,
            company_id: 1,
            email: "ana@example.com".into(),
            access_level: level,
            permissions,
        }
    }

    #[test]
    fn level_or_permission_grants_access() {
        let manager = user(AccessLevel::Manager, vec![]);
        assert!(manager.allows(AccessLevel::Manager, &[Permission::EditUnit]));
        assert!(!manager.allows(AccessLevel::CompanyAdmin, &[Permission::ManageUnit]));

        let editor = user(AccessLevel::Colaborator, vec![Permission::ManageUnit]);
        assert!(editor.allows(AccessLevel::CompanyAdmin, &[Permission::ManageUnit]));
        assert!(editor.require(AccessLevel::CompanyAdmin, &[Permission::ManageRisk]).is_err());
    }

    #[test]
    fn bearer_header_is_required() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def.ghi");
    }
}
