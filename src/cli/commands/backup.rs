use std::path::{Path, PathBuf};

use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::services::backup_service::RESTORE_SUCCESS;
use crate::services::BackupService;

use super::database;

pub async fn export(
    config: &AppConfig,
    company_id: i64,
    output: Option<PathBuf>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let store = database::connect(config).await?;
    if store.company(company_id).await?.is_none() {
        return Err(anyhow::anyhow!("Company {} not found", company_id));
    }

    let (bytes, file_name) = BackupService::new(store).export(company_id).await?;
    let path = output.unwrap_or_else(|| PathBuf::from(file_name));
    tokio::fs::write(&path, &bytes).await?;

    output_success(
        output_format,
        &format!("Company {} exported to {}", company_id, path.display()),
        Some(json!({ "file": path.display().to_string(), "bytes": bytes.len() })),
    )
}

pub async fn restore(
    config: &AppConfig,
    company_id: i64,
    file: &Path,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file).await?;
    let store = database::connect(config).await?;

    let summary = BackupService::new(store)
        .restore(company_id, &bytes, config.api.restore_upload_limit_bytes)
        .await?;

    output_success(
        output_format,
        RESTORE_SUCCESS,
        Some(json!({
            "plans": summary.plans,
            "units": summary.units,
            "risks": summary.risks,
        })),
    )
}
