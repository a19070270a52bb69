use serde_json::{json, Value};

use crate::auth::Permission;
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: OutputFormat, message: &str) {
    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": false, "error": message })),
        OutputFormat::Text => eprintln!("Error: {}", message),
    }
}

/// Accepts the wire names (`MANAGE_UNIT`) case-insensitively
pub fn parse_permission(raw: &str) -> Result<Permission, String> {
    serde_json::from_value(Value::String(raw.trim().to_uppercase()))
        .map_err(|_| format!("unknown permission '{}'", raw))
}
