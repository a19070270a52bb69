pub mod company;
pub mod plan_risk;
pub mod process;
pub mod risk;
pub mod unit;
pub mod user;

pub use company::Company;
pub use plan_risk::PlanRisk;
pub use process::{Process, ProcessUnit};
pub use risk::{Contingency, Incident, Monitor, PreventiveAction, Risk, RiskActivity, RiskProcess, RiskStrategy};
pub use unit::Unit;
pub use user::User;

use serde::Serialize;

/// List payload shared by every collection endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedList<T> {
    pub list: Vec<T>,
    pub total: u64,
}

impl<T> PaginatedList<T> {
    pub fn new(list: Vec<T>, total: u64) -> Self {
        Self { list, total }
    }
}

impl<T> From<Vec<T>> for PaginatedList<T> {
    fn from(list: Vec<T>) -> Self {
        let total = list.len() as u64;
        Self { list, total }
    }
}
