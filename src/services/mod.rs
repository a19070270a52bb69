pub mod backup_service;
pub mod duplication;
pub mod plan_service;
pub mod process_service;
pub mod risk_service;
pub mod scope;
pub mod unit_service;

pub use backup_service::{BackupError, BackupService, RestoreSummary, Snapshot};
pub use duplication::{DuplicationSummary, IdTranslation};
pub use plan_service::{PlanDraft, PlanService, PlanUpdate};
pub use process_service::{ProcessDraft, ProcessService};
pub use risk_service::{RiskCollection, RiskDraft, RiskItem, RiskService, RiskUpdate};
pub use scope::Scope;
pub use unit_service::{SearchParams, UnitDraft, UnitService, UnitUpdate};

use thiserror::Error;

use crate::database::DatabaseError;

/// Business-rule failures shared by every service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Entity missing, soft-deleted or owned by another company
    #[error("{0}")]
    NotFound(String),

    /// Request understood but refused by a business rule
    #[error("{0}")]
    Rejected(String),

    #[error("{message}")]
    Invalid { field: String, message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn invalid(field: &str, message: &str) -> Self {
        ServiceError::Invalid {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trimmed value of a required text field
pub(crate) fn required_text(value: &str, field: &str, message: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid(field, message));
    }
    Ok(trimmed.to_string())
}
