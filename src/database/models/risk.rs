use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub id: i64,
    pub unit_id: i64,
    pub user_id: i64,
    pub code: String,
    pub name: String,
    pub probability: String,
    pub impact: String,
    pub periodicity: String,
    pub tipology: String,
    pub risk_type: String,
    pub begin: DateTime<Utc>,
    pub deleted: bool,
}

impl Risk {
    pub fn duplicate_into(&self, unit_id: i64) -> Self {
        Self {
            id: 0,
            unit_id,
            deleted: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PreventiveAction {
    pub id: i64,
    pub risk_id: i64,
    pub user_id: i64,
    pub action: String,
    pub accomplished: bool,
    pub validity_begin: Option<NaiveDate>,
    pub validity_end: Option<NaiveDate>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: i64,
    pub risk_id: i64,
    pub user_id: i64,
    pub report: String,
    pub probability: String,
    pub impact: String,
    pub begin: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: i64,
    pub risk_id: i64,
    pub user_id: i64,
    pub incident_type: String,
    pub description: String,
    pub action: Option<String>,
    pub begin: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contingency {
    pub id: i64,
    pub risk_id: i64,
    pub user_id: i64,
    pub action: String,
    pub deleted: bool,
}

/// Link between a risk and a strategic objective of a development plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RiskStrategy {
    pub id: i64,
    pub risk_id: i64,
    pub structure_id: Option<i64>,
    pub name: String,
    pub link_fpdi: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RiskActivity {
    pub id: i64,
    pub risk_id: i64,
    pub process_id: i64,
    pub name: String,
    pub link_fpdi: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RiskProcess {
    pub id: i64,
    pub risk_id: i64,
    pub process_id: i64,
    pub name: String,
    pub link_fpdi: Option<String>,
    pub deleted: bool,
}

/// Entities that hang off a single risk and are copied along with it
pub trait RiskChild: Clone {
    fn risk_id(&self) -> i64;

    /// Unsaved copy re-pointed at another risk
    fn attached_to(&self, risk_id: i64) -> Self;
}

macro_rules! impl_risk_child {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RiskChild for $ty {
                fn risk_id(&self) -> i64 {
                    self.risk_id
                }

                fn attached_to(&self, risk_id: i64) -> Self {
                    Self {
                        id: 0,
                        risk_id,
                        deleted: false,
                        ..self.clone()
                    }
                }
            }
        )*
    };
}

impl_risk_child!(
    PreventiveAction,
    Monitor,
    Incident,
    Contingency,
    RiskStrategy,
    RiskActivity,
    RiskProcess,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_copy_drops_identity_and_deletion() {
        let contingency = Contingency {
            id: 42,
            risk_id: 7,
            user_id: 3,
            action: "Acionar plano B".into(),
            deleted: true,
        };
        let copy = contingency.attached_to(99);
        assert_eq!(copy.id, 0);
        assert_eq!(copy.risk_id, 99);
        assert!(!copy.deleted);
        assert_eq!(copy.action, contingency.action);
        assert_eq!(copy.user_id, 3);
    }
}
