use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::models::User;

/// Ordered access levels; a higher level satisfies every lower requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessLevel {
    Authenticated,
    Colaborator,
    Manager,
    CompanyAdmin,
    SystemAdmin,
}

impl AccessLevel {
    pub fn value(self) -> i32 {
        match self {
            AccessLevel::Authenticated => 5,
            AccessLevel::Colaborator => 10,
            AccessLevel::Manager => 15,
            AccessLevel::CompanyAdmin => 20,
            AccessLevel::SystemAdmin => 100,
        }
    }

    /// Highest level whose value does not exceed `value`
    pub fn from_value(value: i32) -> Self {
        [
            AccessLevel::SystemAdmin,
            AccessLevel::CompanyAdmin,
            AccessLevel::Manager,
            AccessLevel::Colaborator,
        ]
        .into_iter()
        .find(|level| value >= level.value())
        .unwrap_or(AccessLevel::Authenticated)
    }
}

/// Named grants that open an operation regardless of access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ManagePlanRisk,
    ManageUnit,
    EditUnit,
    ManageRisk,
    ManageProcess,
    ExportData,
    RestoreData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub company_id: i64,
    pub email: String,
    pub access_level: i32,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &User, permissions: Vec<Permission>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user.id,
            company_id: user.company_id,
            email: user.email.clone(),
            access_level: user.access_level,
            permissions,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    MissingSecret,
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(access_level: i32) -> User {
        User {
            id: 7,
            company_id: 3,
            name: "Maria".into(),
            email: "maria@example.com".into(),
            access_level,
            deleted: false,
        }
    }

    #[test]
    fn access_levels_round_trip_through_values() {
        assert_eq!(AccessLevel::from_value(20), AccessLevel::CompanyAdmin);
        assert_eq!(AccessLevel::from_value(17), AccessLevel::Manager);
        assert_eq!(AccessLevel::from_value(0), AccessLevel::Authenticated);
        assert_eq!(AccessLevel::from_value(500), AccessLevel::SystemAdmin);
        assert!(AccessLevel::CompanyAdmin > AccessLevel::Manager);
    }

    #[test]
    fn token_carries_claims() {
        let claims = Claims::new(&user(15), vec![Permission::ManageUnit], 1);
        let token = generate_jwt(&claims, "secret").unwrap();
        let decoded = validate_jwt(&token, "secret").unwrap();
        assert_eq!(decoded.sub, 7);
        assert_eq!(decoded.company_id, 3);
        assert_eq!(decoded.permissions, vec![Permission::ManageUnit]);
    }

    #[test]
    fn wrong_or_missing_secret_is_rejected() {
        let claims = Claims::new(&user(5), vec![], 1);
        let token = generate_jwt(&claims, "secret").unwrap();
        assert!(matches!(validate_jwt(&token, "other"), Err(AuthError::InvalidToken(_))));
        assert!(matches!(validate_jwt(&token, ""), Err(AuthError::MissingSecret)));
        assert!(matches!(generate_jwt(&claims, ""), Err(AuthError::MissingSecret)));
    }
}
