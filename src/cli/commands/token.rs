use serde_json::json;

use crate::auth::{self, AccessLevel, Claims, Permission};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

use super::database;

pub async fn issue(
    config: &AppConfig,
    user_id: i64,
    permissions: Vec<Permission>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let store = database::connect(config).await?;
    let user = store
        .user(user_id)
        .await?
        .filter(|user| !user.deleted)
        .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;

    let claims = Claims::new(&user, permissions, config.security.jwt_expiry_hours);
    let token = auth::generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_success(
            output_format,
            "Token issued",
            Some(json!({
                "token": token,
                "userId": user.id,
                "companyId": user.company_id,
                "accessLevel": format!("{:?}", AccessLevel::from_value(user.access_level)),
                "expiresAt": claims.exp,
            })),
        )?,
    }
    Ok(())
}
