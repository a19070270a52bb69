use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::models::risk::RiskChild;
use crate::database::models::{
    Contingency, Incident, Monitor, PlanRisk, PreventiveAction, Process, ProcessUnit, Risk, RiskActivity,
    RiskProcess, RiskStrategy, Unit,
};
use crate::database::{DatabaseError, Store, Table};

use super::duplication::IdTranslation;
use super::{Scope, ServiceError};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const RESTORE_SUCCESS: &str = "Dados importados com sucesso.";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Arquivo excede o tamanho máximo permitido ({size} de {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Arquivo de backup inválido: {0}")]
    Malformed(String),

    #[error("Versão de backup não suportada: {0}")]
    UnsupportedVersion(u32),

    #[error("O backup pertence a outra empresa")]
    CompanyMismatch,

    #[error("Checksum do backup não confere")]
    ChecksumMismatch,

    #[error("Referência inválida no backup: {0}")]
    BrokenReference(String),

    #[error("Falha ao gerar o backup: {0}")]
    Encoding(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<DatabaseError> for BackupError {
    fn from(err: DatabaseError) -> Self {
        BackupError::Service(err.into())
    }
}

pub type BackupResult<T> = Result<T, BackupError>;

/// Every plan of one company and everything below it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub plans: Vec<PlanRisk>,
    pub units: Vec<Unit>,
    pub processes: Vec<Process>,
    pub process_units: Vec<ProcessUnit>,
    pub risks: Vec<Risk>,
    pub preventive_actions: Vec<PreventiveAction>,
    pub monitors: Vec<Monitor>,
    pub incidents: Vec<Incident>,
    pub contingencies: Vec<Contingency>,
    pub risk_strategies: Vec<RiskStrategy>,
    pub risk_activities: Vec<RiskActivity>,
    pub risk_processes: Vec<RiskProcess>,
}

impl SnapshotData {
    /// Hex SHA-256 of the serialized data
    pub fn checksum(&self) -> BackupResult<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| BackupError::Encoding(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Export blob of one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub company_id: i64,
    pub exported_at: DateTime<Utc>,
    pub checksum: String,
    pub data: SnapshotData,
}

impl Snapshot {
    pub fn new(company_id: i64, data: SnapshotData) -> BackupResult<Self> {
        Ok(Self {
            version: SNAPSHOT_VERSION,
            company_id,
            exported_at: Utc::now(),
            checksum: data.checksum()?,
            data,
        })
    }

    pub fn file_name(&self) -> String {
        format!("plans-{}-{}.json", self.company_id, self.exported_at.format("%Y%m%d%H%M%S"))
    }

    pub fn to_bytes(&self) -> BackupResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| BackupError::Encoding(e.to_string()))
    }

    /// Parses a blob, rejecting it when larger than `limit` bytes
    pub fn from_bytes(bytes: &[u8], limit: usize) -> BackupResult<Self> {
        if bytes.len() > limit {
            return Err(BackupError::TooLarge {
                size: bytes.len(),
                limit,
            });
        }
        serde_json::from_slice(bytes).map_err(|e| BackupError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub plans: usize,
    pub units: usize,
    pub risks: usize,
}

pub struct BackupService {
    store: Arc<dyn Store>,
}

impl BackupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, company_id: i64) -> BackupResult<Snapshot> {
        let store = self.store.as_ref();
        let mut data = SnapshotData {
            plans: store.plan_risks_by_company(company_id).await?,
            ..SnapshotData::default()
        };

        let mut process_ids = HashSet::new();
        for plan in &data.plans {
            data.units.extend(store.units_by_plan(plan.id).await?);
        }
        for unit in &data.units {
            for link in store.process_links_by_unit(unit.id).await? {
                process_ids.insert(link.process_id);
                data.process_units.push(link);
            }
            process_ids.extend(store.processes_owned_by_unit(unit.id).await?.iter().map(|p| p.id));
            data.risks.extend(store.risks_by_unit(unit.id).await?);
        }

        let mut process_ids: Vec<i64> = process_ids.into_iter().collect();
        process_ids.sort_unstable();
        for process_id in process_ids {
            match store.process(process_id).await? {
                Some(process) if !process.deleted && process.company_id == company_id => {
                    data.processes.push(process)
                }
                _ => debug!("Process {} left out of export", process_id),
            }
        }
        let unit_ids: HashSet<i64> = data.units.iter().map(|u| u.id).collect();
        data.processes.retain(|process| unit_ids.contains(&process.unit_id));
        let exported: HashSet<i64> = data.processes.iter().map(|p| p.id).collect();
        data.process_units.retain(|link| exported.contains(&link.process_id));

        for risk in &data.risks {
            data.preventive_actions.extend(store.preventive_actions(risk.id).await?);
            data.monitors.extend(store.monitors(risk.id).await?);
            data.incidents.extend(store.incidents(risk.id).await?);
            data.contingencies.extend(store.contingencies(risk.id).await?);
            data.risk_strategies.extend(store.risk_strategies(risk.id).await?);
            data.risk_activities.extend(store.risk_activities(risk.id).await?);
            data.risk_processes.extend(store.risk_processes(risk.id).await?);
        }
        // Links to deleted processes have nothing to point at after a restore
        data.risk_activities.retain(|item| exported.contains(&item.process_id));
        data.risk_processes.retain(|item| exported.contains(&item.process_id));

        Snapshot::new(company_id, data)
    }

    /// Serialized snapshot and its download file name
    pub async fn export(&self, company_id: i64) -> BackupResult<(Vec<u8>, String)> {
        let snapshot = self.snapshot(company_id).await?;
        let bytes = snapshot.to_bytes()?;
        info!(
            "Exported {} plan(s) of company {} ({} bytes)",
            snapshot.data.plans.len(),
            company_id,
            bytes.len()
        );
        Ok((bytes, snapshot.file_name()))
    }

    pub async fn restore(&self, company_id: i64, bytes: &[u8], limit: usize) -> BackupResult<RestoreSummary> {
        let snapshot = Snapshot::from_bytes(bytes, limit)?;
        self.restore_snapshot(company_id, snapshot).await
    }

    /// Validates the whole snapshot, then retires the company's current plans
    /// and imports the snapshot under fresh ids in one transaction.
    pub async fn restore_snapshot(&self, company_id: i64, snapshot: Snapshot) -> BackupResult<RestoreSummary> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(BackupError::UnsupportedVersion(snapshot.version));
        }
        if snapshot.company_id != company_id {
            warn!("Company {} tried to restore a backup of company {}", company_id, snapshot.company_id);
            return Err(BackupError::CompanyMismatch);
        }
        if snapshot.data.checksum()? != snapshot.checksum {
            return Err(BackupError::ChecksumMismatch);
        }
        self.validate_references(company_id, &snapshot.data).await?;

        let tx = self.store.begin().await?;
        retire_current_plans(tx.store(), company_id).await?;
        let summary = import(tx.store(), company_id, snapshot.data).await?;
        tx.commit().await?;
        info!(
            "Restored company {}: {} plan(s), {} unit(s), {} risk(s)",
            company_id, summary.plans, summary.units, summary.risks
        );
        Ok(summary)
    }

    async fn validate_references(&self, company_id: i64, data: &SnapshotData) -> BackupResult<()> {
        let plans: HashSet<i64> = data.plans.iter().map(|p| p.id).collect();
        let units: BTreeMap<i64, &Unit> = data.units.iter().map(|u| (u.id, u)).collect();
        let processes: HashSet<i64> = data.processes.iter().map(|p| p.id).collect();
        let risks: HashSet<i64> = data.risks.iter().map(|r| r.id).collect();

        if let Some(plan) = data.plans.iter().find(|p| p.company_id != company_id) {
            return Err(broken(format!("plano {} de outra empresa", plan.id)));
        }
        for unit in &data.units {
            if !plans.contains(&unit.plan_risk_id) {
                return Err(broken(format!("unidade {} sem plano", unit.id)));
            }
            if let Some(parent_id) = unit.parent_id {
                match units.get(&parent_id) {
                    Some(parent) if parent.plan_risk_id == unit.plan_risk_id && parent.parent_id.is_none() => {}
                    _ => return Err(broken(format!("unidade {} sem unidade pai", unit.id))),
                }
            }
        }
        for process in &data.processes {
            if process.company_id != company_id || !units.contains_key(&process.unit_id) {
                return Err(broken(format!("processo {}", process.id)));
            }
        }
        for link in &data.process_units {
            if !processes.contains(&link.process_id) || !units.contains_key(&link.unit_id) {
                return Err(broken(format!("vínculo de processo {}", link.id)));
            }
        }
        for risk in &data.risks {
            if !units.contains_key(&risk.unit_id) {
                return Err(broken(format!("risco {} sem unidade", risk.id)));
            }
        }

        let orphan = |owner: i64| !risks.contains(&owner);
        let child_owners = data
            .preventive_actions
            .iter()
            .map(RiskChild::risk_id)
            .chain(data.monitors.iter().map(RiskChild::risk_id))
            .chain(data.incidents.iter().map(RiskChild::risk_id))
            .chain(data.contingencies.iter().map(RiskChild::risk_id))
            .chain(data.risk_strategies.iter().map(RiskChild::risk_id))
            .chain(data.risk_activities.iter().map(RiskChild::risk_id))
            .chain(data.risk_processes.iter().map(RiskChild::risk_id));
        for owner in child_owners {
            if orphan(owner) {
                return Err(broken(format!("item ligado ao risco inexistente {}", owner)));
            }
        }

        let linked = data
            .risk_activities
            .iter()
            .map(|a| a.process_id)
            .chain(data.risk_processes.iter().map(|p| p.process_id));
        for process_id in linked {
            if !processes.contains(&process_id) {
                return Err(broken(format!("processo {} referenciado por risco", process_id)));
            }
        }

        // Responsible users are not part of the snapshot and must already exist
        let scope = Scope::new(self.store.as_ref(), company_id);
        let mut users: HashSet<i64> = data.units.iter().map(|u| u.user_id).collect();
        users.extend(data.risks.iter().map(|r| r.user_id));
        users.extend(data.preventive_actions.iter().map(|a| a.user_id));
        users.extend(data.monitors.iter().map(|m| m.user_id));
        users.extend(data.incidents.iter().map(|i| i.user_id));
        users.extend(data.contingencies.iter().map(|c| c.user_id));
        for user_id in users {
            if scope.user(user_id).await?.is_none() {
                return Err(broken(format!("usuário {} não pertence à empresa", user_id)));
            }
        }
        Ok(())
    }
}

async fn retire_current_plans(store: &dyn Store, company_id: i64) -> BackupResult<()> {
    for plan in store.plan_risks_by_company(company_id).await? {
        for unit in store.units_by_plan(plan.id).await? {
            for process in store.processes_owned_by_unit(unit.id).await? {
                store.soft_delete(Table::Process, process.id).await?;
            }
        }
        store.soft_delete(Table::PlanRisk, plan.id).await?;
        debug!("Retired plan {} before restore", plan.id);
    }
    Ok(())
}

async fn import(store: &dyn Store, company_id: i64, data: SnapshotData) -> BackupResult<RestoreSummary> {
    let mut ids = IdTranslation::new();

    for plan in &data.plans {
        let copy = store
            .insert_plan_risk(&PlanRisk {
                company_id,
                deleted: false,
                ..plan.clone()
            })
            .await?;
        ids.record(Table::PlanRisk, plan.id, copy.id);
    }

    // Top-level units first so subunit parents are already translated
    let (top, sub): (Vec<&Unit>, Vec<&Unit>) = data.units.iter().partition(|u| !u.is_subunit());
    for unit in top.into_iter().chain(sub) {
        let plan_id = translated(&ids, Table::PlanRisk, unit.plan_risk_id)?;
        let parent_id = match unit.parent_id {
            Some(parent) => Some(translated(&ids, Table::Unit, parent)?),
            None => None,
        };
        let copy = store.insert_unit(&unit.duplicate_into(plan_id, parent_id)).await?;
        ids.record(Table::Unit, unit.id, copy.id);
    }

    for process in &data.processes {
        let copy = store
            .insert_process(&Process {
                company_id,
                unit_id: translated(&ids, Table::Unit, process.unit_id)?,
                deleted: false,
                ..process.clone()
            })
            .await?;
        ids.record(Table::Process, process.id, copy.id);
    }
    for link in &data.process_units {
        store
            .insert_process_unit(&ProcessUnit {
                id: 0,
                process_id: translated(&ids, Table::Process, link.process_id)?,
                unit_id: translated(&ids, Table::Unit, link.unit_id)?,
                deleted: false,
            })
            .await?;
    }

    for risk in &data.risks {
        let unit_id = translated(&ids, Table::Unit, risk.unit_id)?;
        let copy = store.insert_risk(&risk.duplicate_into(unit_id)).await?;
        ids.record(Table::Risk, risk.id, copy.id);
    }

    for item in &data.preventive_actions {
        store
            .insert_preventive_action(&item.attached_to(translated(&ids, Table::Risk, item.risk_id)?))
            .await?;
    }
    for item in &data.monitors {
        store.insert_monitor(&item.attached_to(translated(&ids, Table::Risk, item.risk_id)?)).await?;
    }
    for item in &data.incidents {
        store.insert_incident(&item.attached_to(translated(&ids, Table::Risk, item.risk_id)?)).await?;
    }
    for item in &data.contingencies {
        store.insert_contingency(&item.attached_to(translated(&ids, Table::Risk, item.risk_id)?)).await?;
    }
    for item in &data.risk_strategies {
        store
            .insert_risk_strategy(&item.attached_to(translated(&ids, Table::Risk, item.risk_id)?))
            .await?;
    }
    for item in &data.risk_activities {
        let mut copy = item.attached_to(translated(&ids, Table::Risk, item.risk_id)?);
        copy.process_id = translated(&ids, Table::Process, item.process_id)?;
        store.insert_risk_activity(&copy).await?;
    }
    for item in &data.risk_processes {
        let mut copy = item.attached_to(translated(&ids, Table::Risk, item.risk_id)?);
        copy.process_id = translated(&ids, Table::Process, item.process_id)?;
        store.insert_risk_process(&copy).await?;
    }

    Ok(RestoreSummary {
        plans: ids.count(Table::PlanRisk),
        units: ids.count(Table::Unit),
        risks: ids.count(Table::Risk),
    })
}

fn broken(detail: String) -> BackupError {
    BackupError::BrokenReference(detail)
}

fn translated(ids: &IdTranslation, table: Table, original: i64) -> BackupResult<i64> {
    ids.get(table, original)
        .ok_or_else(|| broken(format!("{} {}", table.name(), original)))
}
