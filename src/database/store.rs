use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Company, Contingency, Incident, Monitor, PlanRisk, PreventiveAction, Process, ProcessUnit, Risk,
    RiskActivity, RiskProcess, RiskStrategy, Unit, User,
};

/// Soft-deletable tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    PlanRisk,
    Unit,
    Process,
    ProcessUnit,
    Risk,
    PreventiveAction,
    Monitor,
    Incident,
    Contingency,
    RiskStrategy,
    RiskActivity,
    RiskProcess,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::PlanRisk => "plan_risk",
            Table::Unit => "unit",
            Table::Process => "process",
            Table::ProcessUnit => "process_unit",
            Table::Risk => "risk",
            Table::PreventiveAction => "preventive_action",
            Table::Monitor => "monitor",
            Table::Incident => "incident",
            Table::Contingency => "contingency",
            Table::RiskStrategy => "risk_strategy",
            Table::RiskActivity => "risk_activity",
            Table::RiskProcess => "risk_process",
        }
    }

    /// Tables whose rows carry a `risk_id`
    pub fn is_risk_child(self) -> bool {
        matches!(
            self,
            Table::PreventiveAction
                | Table::Monitor
                | Table::Incident
                | Table::Contingency
                | Table::RiskStrategy
                | Table::RiskActivity
                | Table::RiskProcess
        )
    }
}

/// Persistence seam used by every business service.
///
/// Reads never return soft-deleted rows from list methods; single-row lookups
/// return the row regardless of its `deleted` flag so callers can tell
/// "missing" from "deleted". Inserts ignore the `id` of their argument and
/// return the stored row.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    async fn company(&self, id: i64) -> Result<Option<Company>, DatabaseError>;
    async fn user(&self, id: i64) -> Result<Option<User>, DatabaseError>;

    async fn plan_risk(&self, id: i64) -> Result<Option<PlanRisk>, DatabaseError>;
    async fn plan_risks_by_company(&self, company_id: i64) -> Result<Vec<PlanRisk>, DatabaseError>;
    async fn insert_plan_risk(&self, plan: &PlanRisk) -> Result<PlanRisk, DatabaseError>;
    async fn update_plan_risk(&self, plan: &PlanRisk) -> Result<(), DatabaseError>;

    async fn unit(&self, id: i64) -> Result<Option<Unit>, DatabaseError>;
    /// Every unit and subunit of a plan, ordered by id
    async fn units_by_plan(&self, plan_risk_id: i64) -> Result<Vec<Unit>, DatabaseError>;
    async fn subunits(&self, parent_id: i64) -> Result<Vec<Unit>, DatabaseError>;
    async fn insert_unit(&self, unit: &Unit) -> Result<Unit, DatabaseError>;
    async fn update_unit(&self, unit: &Unit) -> Result<(), DatabaseError>;

    async fn process(&self, id: i64) -> Result<Option<Process>, DatabaseError>;
    /// Processes linked to the unit through live `process_unit` rows
    async fn processes_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError>;
    /// Live processes whose owner is the unit, linked or not
    async fn processes_owned_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError>;
    async fn process_links_by_unit(&self, unit_id: i64) -> Result<Vec<ProcessUnit>, DatabaseError>;
    async fn insert_process(&self, process: &Process) -> Result<Process, DatabaseError>;
    async fn insert_process_unit(&self, link: &ProcessUnit) -> Result<ProcessUnit, DatabaseError>;

    async fn risk(&self, id: i64) -> Result<Option<Risk>, DatabaseError>;
    async fn risks_by_unit(&self, unit_id: i64) -> Result<Vec<Risk>, DatabaseError>;
    async fn insert_risk(&self, risk: &Risk) -> Result<Risk, DatabaseError>;
    async fn update_risk(&self, risk: &Risk) -> Result<(), DatabaseError>;

    async fn preventive_actions(&self, risk_id: i64) -> Result<Vec<PreventiveAction>, DatabaseError>;
    async fn insert_preventive_action(&self, item: &PreventiveAction) -> Result<PreventiveAction, DatabaseError>;
    async fn monitors(&self, risk_id: i64) -> Result<Vec<Monitor>, DatabaseError>;
    async fn insert_monitor(&self, item: &Monitor) -> Result<Monitor, DatabaseError>;
    async fn incidents(&self, risk_id: i64) -> Result<Vec<Incident>, DatabaseError>;
    async fn insert_incident(&self, item: &Incident) -> Result<Incident, DatabaseError>;
    async fn contingencies(&self, risk_id: i64) -> Result<Vec<Contingency>, DatabaseError>;
    async fn insert_contingency(&self, item: &Contingency) -> Result<Contingency, DatabaseError>;
    async fn risk_strategies(&self, risk_id: i64) -> Result<Vec<RiskStrategy>, DatabaseError>;
    async fn insert_risk_strategy(&self, item: &RiskStrategy) -> Result<RiskStrategy, DatabaseError>;
    async fn risk_activities(&self, risk_id: i64) -> Result<Vec<RiskActivity>, DatabaseError>;
    async fn insert_risk_activity(&self, item: &RiskActivity) -> Result<RiskActivity, DatabaseError>;
    async fn risk_processes(&self, risk_id: i64) -> Result<Vec<RiskProcess>, DatabaseError>;
    async fn insert_risk_process(&self, item: &RiskProcess) -> Result<RiskProcess, DatabaseError>;

    /// `risk_id` of a live row in a risk child table
    async fn risk_child_owner(&self, table: Table, id: i64) -> Result<Option<i64>, DatabaseError>;

    /// Marks a row deleted. Returns false when no live row had that id.
    async fn soft_delete(&self, table: Table, id: i64) -> Result<bool, DatabaseError>;

    /// Opens a transaction. Nothing written through it is visible to this
    /// store until `commit`; dropping it discards every write.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError>;
}

#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Store view that reads and writes inside the transaction
    fn store(&self) -> &dyn Store;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
