use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: i64,
    pub company_id: i64,
    /// Owning unit; further units are attached through `ProcessUnit`
    pub unit_id: i64,
    pub name: String,
    pub objective: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUnit {
    pub id: i64,
    pub process_id: i64,
    pub unit_id: i64,
    pub deleted: bool,
}
