use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Organizational node of a risk plan. Units with a `parent_id` are subunits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: i64,
    pub plan_risk_id: i64,
    pub parent_id: Option<i64>,
    pub user_id: i64,
    pub name: String,
    pub abbreviation: String,
    pub description: Option<String>,
    pub deleted: bool,
}

impl Unit {
    pub fn is_subunit(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Copy of this unit placed in another plan under another parent, not yet stored
    pub fn duplicate_into(&self, plan_risk_id: i64, parent_id: Option<i64>) -> Self {
        Self {
            id: 0,
            plan_risk_id,
            parent_id,
            deleted: false,
            ..self.clone()
        }
    }
}
