use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Company, Contingency, Incident, Monitor, PlanRisk, PreventiveAction, Process, ProcessUnit, Risk,
    RiskActivity, RiskProcess, RiskStrategy, Unit, User,
};
use crate::database::store::{Store, StoreTransaction, Table};

#[derive(Default, Clone)]
struct Tables {
    next_id: i64,
    companies: BTreeMap<i64, Company>,
    users: BTreeMap<i64, User>,
    plans: BTreeMap<i64, PlanRisk>,
    units: BTreeMap<i64, Unit>,
    processes: BTreeMap<i64, Process>,
    process_units: BTreeMap<i64, ProcessUnit>,
    risks: BTreeMap<i64, Risk>,
    preventive_actions: BTreeMap<i64, PreventiveAction>,
    monitors: BTreeMap<i64, Monitor>,
    incidents: BTreeMap<i64, Incident>,
    contingencies: BTreeMap<i64, Contingency>,
    risk_strategies: BTreeMap<i64, RiskStrategy>,
    risk_activities: BTreeMap<i64, RiskActivity>,
    risk_processes: BTreeMap<i64, RiskProcess>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store for development and tests.
///
/// Ids come from a single counter shared by all tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

/// Private copy of the tables, written back on commit. The store's write lock
/// is held for the whole transaction.
struct MemoryTransaction {
    staging: MemoryStore,
    guard: OwnedRwLockWriteGuard<Tables>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn store(&self) -> &dyn Store {
        &self.staging
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTransaction { staging, mut guard } = *self;
        *guard = match Arc::try_unwrap(staging.tables) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => shared.read().await.clone(),
        };
        Ok(())
    }
}

/// Inserts a clone of `$item` under a fresh id and returns the stored copy
macro_rules! insert_row {
    ($self:ident, $field:ident, $item:expr) => {{
        let mut tables = $self.tables.write().await;
        let id = tables.allocate_id();
        let mut row = $item.clone();
        row.id = id;
        tables.$field.insert(id, row.clone());
        Ok(row)
    }};
}

/// Live rows of a risk child table for one risk
macro_rules! rows_by_risk {
    ($self:ident, $field:ident, $risk_id:expr) => {{
        let tables = $self.tables.read().await;
        Ok(tables
            .$field
            .values()
            .filter(|row| row.risk_id == $risk_id && !row.deleted)
            .cloned()
            .collect())
    }};
}

macro_rules! mark_deleted {
    ($tables:ident, $field:ident, $id:expr) => {
        match $tables.$field.get_mut(&$id) {
            Some(row) if !row.deleted => {
                row.deleted = true;
                true
            }
            _ => false,
        }
    };
}

macro_rules! live_owner {
    ($tables:ident, $field:ident, $id:expr) => {
        $tables
            .$field
            .get(&$id)
            .filter(|row| !row.deleted)
            .map(|row| row.risk_id)
    };
}

impl MemoryStore {
    pub const DEMO_ADMIN_ID: i64 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Companies and users are managed outside this service, so they are seeded directly.
    pub async fn seed_company(&self, company: Company) {
        let mut tables = self.tables.write().await;
        tables.next_id = tables.next_id.max(company.id);
        tables.companies.insert(company.id, company);
    }

    pub async fn seed_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.next_id = tables.next_id.max(user.id);
        tables.users.insert(user.id, user);
    }

    /// One company with a company administrator, for running the server without PostgreSQL
    pub async fn with_demo_data() -> Self {
        let store = Self::new();
        store
            .seed_company(Company {
                id: 1,
                name: "Demo".to_string(),
                domain: "demo.localhost".to_string(),
            })
            .await;
        store
            .seed_user(User {
                id: Self::DEMO_ADMIN_ID,
                company_id: 1,
                name: "Administrador".to_string(),
                email: "admin@demo.localhost".to_string(),
                access_level: crate::auth::AccessLevel::CompanyAdmin.value(),
                deleted: false,
            })
            .await;
        store
    }
}

fn update_existing<T: Clone>(map: &mut BTreeMap<i64, T>, id: i64, row: &T, what: &str) -> Result<(), DatabaseError> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = row.clone();
            Ok(())
        }
        None => Err(DatabaseError::NotFound(format!("{} {}", what, id))),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        let _ = self.tables.read().await;
        Ok(())
    }

    async fn company(&self, id: i64) -> Result<Option<Company>, DatabaseError> {
        Ok(self.tables.read().await.companies.get(&id).cloned())
    }

    async fn user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn plan_risk(&self, id: i64) -> Result<Option<PlanRisk>, DatabaseError> {
        Ok(self.tables.read().await.plans.get(&id).cloned())
    }

    async fn plan_risks_by_company(&self, company_id: i64) -> Result<Vec<PlanRisk>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .plans
            .values()
            .filter(|plan| plan.company_id == company_id && !plan.deleted)
            .cloned()
            .collect())
    }

    async fn insert_plan_risk(&self, plan: &PlanRisk) -> Result<PlanRisk, DatabaseError> {
        insert_row!(self, plans, plan)
    }

    async fn update_plan_risk(&self, plan: &PlanRisk) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        update_existing(&mut tables.plans, plan.id, plan, "plan_risk")
    }

    async fn unit(&self, id: i64) -> Result<Option<Unit>, DatabaseError> {
        Ok(self.tables.read().await.units.get(&id).cloned())
    }

    async fn units_by_plan(&self, plan_risk_id: i64) -> Result<Vec<Unit>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .units
            .values()
            .filter(|unit| unit.plan_risk_id == plan_risk_id && !unit.deleted)
            .cloned()
            .collect())
    }

    async fn subunits(&self, parent_id: i64) -> Result<Vec<Unit>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .units
            .values()
            .filter(|unit| unit.parent_id == Some(parent_id) && !unit.deleted)
            .cloned()
            .collect())
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<Unit, DatabaseError> {
        insert_row!(self, units, unit)
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        update_existing(&mut tables.units, unit.id, unit, "unit")
    }

    async fn process(&self, id: i64) -> Result<Option<Process>, DatabaseError> {
        Ok(self.tables.read().await.processes.get(&id).cloned())
    }

    async fn processes_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut processes: Vec<Process> = tables
            .process_units
            .values()
            .filter(|link| link.unit_id == unit_id && !link.deleted)
            .filter_map(|link| tables.processes.get(&link.process_id))
            .filter(|process| !process.deleted)
            .cloned()
            .collect();
        processes.sort_by_key(|process| process.id);
        processes.dedup_by_key(|process| process.id);
        Ok(processes)
    }

    async fn processes_owned_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .processes
            .values()
            .filter(|process| process.unit_id == unit_id && !process.deleted)
            .cloned()
            .collect())
    }

    async fn process_links_by_unit(&self, unit_id: i64) -> Result<Vec<ProcessUnit>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .process_units
            .values()
            .filter(|link| link.unit_id == unit_id && !link.deleted)
            .cloned()
            .collect())
    }

    async fn insert_process(&self, process: &Process) -> Result<Process, DatabaseError> {
        insert_row!(self, processes, process)
    }

    async fn insert_process_unit(&self, link: &ProcessUnit) -> Result<ProcessUnit, DatabaseError> {
        insert_row!(self, process_units, link)
    }

    async fn risk(&self, id: i64) -> Result<Option<Risk>, DatabaseError> {
        Ok(self.tables.read().await.risks.get(&id).cloned())
    }

    async fn risks_by_unit(&self, unit_id: i64) -> Result<Vec<Risk>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .risks
            .values()
            .filter(|risk| risk.unit_id == unit_id && !risk.deleted)
            .cloned()
            .collect())
    }

    async fn insert_risk(&self, risk: &Risk) -> Result<Risk, DatabaseError> {
        insert_row!(self, risks, risk)
    }

    async fn update_risk(&self, risk: &Risk) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        update_existing(&mut tables.risks, risk.id, risk, "risk")
    }

    async fn preventive_actions(&self, risk_id: i64) -> Result<Vec<PreventiveAction>, DatabaseError> {
        rows_by_risk!(self, preventive_actions, risk_id)
    }

    async fn insert_preventive_action(&self, item: &PreventiveAction) -> Result<PreventiveAction, DatabaseError> {
        insert_row!(self, preventive_actions, item)
    }

    async fn monitors(&self, risk_id: i64) -> Result<Vec<Monitor>, DatabaseError> {
        rows_by_risk!(self, monitors, risk_id)
    }

    async fn insert_monitor(&self, item: &Monitor) -> Result<Monitor, DatabaseError> {
        insert_row!(self, monitors, item)
    }

    async fn incidents(&self, risk_id: i64) -> Result<Vec<Incident>, DatabaseError> {
        rows_by_risk!(self, incidents, risk_id)
    }

    async fn insert_incident(&self, item: &Incident) -> Result<Incident, DatabaseError> {
        insert_row!(self, incidents, item)
    }

    async fn contingencies(&self, risk_id: i64) -> Result<Vec<Contingency>, DatabaseError> {
        rows_by_risk!(self, contingencies, risk_id)
    }

    async fn insert_contingency(&self, item: &Contingency) -> Result<Contingency, DatabaseError> {
        insert_row!(self, contingencies, item)
    }

    async fn risk_strategies(&self, risk_id: i64) -> Result<Vec<RiskStrategy>, DatabaseError> {
        rows_by_risk!(self, risk_strategies, risk_id)
    }

    async fn insert_risk_strategy(&self, item: &RiskStrategy) -> Result<RiskStrategy, DatabaseError> {
        insert_row!(self, risk_strategies, item)
    }

    async fn risk_activities(&self, risk_id: i64) -> Result<Vec<RiskActivity>, DatabaseError> {
        rows_by_risk!(self, risk_activities, risk_id)
    }

    async fn insert_risk_activity(&self, item: &RiskActivity) -> Result<RiskActivity, DatabaseError> {
        insert_row!(self, risk_activities, item)
    }

    async fn risk_processes(&self, risk_id: i64) -> Result<Vec<RiskProcess>, DatabaseError> {
        rows_by_risk!(self, risk_processes, risk_id)
    }

    async fn insert_risk_process(&self, item: &RiskProcess) -> Result<RiskProcess, DatabaseError> {
        insert_row!(self, risk_processes, item)
    }

    async fn risk_child_owner(&self, table: Table, id: i64) -> Result<Option<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        let owner = match table {
            Table::PreventiveAction => live_owner!(tables, preventive_actions, id),
            Table::Monitor => live_owner!(tables, monitors, id),
            Table::Incident => live_owner!(tables, incidents, id),
            Table::Contingency => live_owner!(tables, contingencies, id),
            Table::RiskStrategy => live_owner!(tables, risk_strategies, id),
            Table::RiskActivity => live_owner!(tables, risk_activities, id),
            Table::RiskProcess => live_owner!(tables, risk_processes, id),
            other => {
                return Err(DatabaseError::QueryError(format!(
                    "{} is not a risk child table",
                    other.name()
                )))
            }
        };
        Ok(owner)
    }

    async fn soft_delete(&self, table: Table, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        let deleted = match table {
            Table::PlanRisk => mark_deleted!(tables, plans, id),
            Table::Unit => mark_deleted!(tables, units, id),
            Table::Process => mark_deleted!(tables, processes, id),
            Table::ProcessUnit => mark_deleted!(tables, process_units, id),
            Table::Risk => mark_deleted!(tables, risks, id),
            Table::PreventiveAction => mark_deleted!(tables, preventive_actions, id),
            Table::Monitor => mark_deleted!(tables, monitors, id),
            Table::Incident => mark_deleted!(tables, incidents, id),
            Table::Contingency => mark_deleted!(tables, contingencies, id),
            Table::RiskStrategy => mark_deleted!(tables, risk_strategies, id),
            Table::RiskActivity => mark_deleted!(tables, risk_activities, id),
            Table::RiskProcess => mark_deleted!(tables, risk_processes, id),
        };
        Ok(deleted)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let guard = self.tables.clone().write_owned().await;
        let staging = MemoryStore {
            tables: Arc::new(RwLock::new((*guard).clone())),
        };
        Ok(Box::new(MemoryTransaction { staging, guard }))
    }
}
