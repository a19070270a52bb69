use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::database::models::{PaginatedList, Process, ProcessUnit};
use crate::database::{Store, Table};

use super::risk_service::PROCESS_NOT_FOUND;
use super::unit_service::UNIT_NOT_FOUND;
use super::{required_text, Scope, ServiceError, ServiceResult};

pub const RELATED_UNIT_NOT_FOUND: &str = "Uma das unidades relacionadas não foi encontrada.";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDraft {
    /// Owning unit
    pub unit_id: i64,
    pub name: String,
    pub objective: Option<String>,
    #[serde(default)]
    pub related_unit_ids: Vec<i64>,
}

pub struct ProcessService {
    store: Arc<dyn Store>,
}

impl ProcessService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Saves the process and links it to its owner and every related unit.
    /// All units are checked before anything is written.
    pub async fn create(&self, company_id: i64, draft: ProcessDraft) -> ServiceResult<Process> {
        let scope = Scope::new(self.store.as_ref(), company_id);
        let owner = scope
            .unit(draft.unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;
        let name = required_text(&draft.name, "name", "O nome do processo é obrigatório")?;

        let mut linked = vec![owner.id];
        for unit_id in draft.related_unit_ids {
            if linked.contains(&unit_id) {
                continue;
            }
            if scope.unit(unit_id).await?.is_none() {
                return Err(ServiceError::Rejected(RELATED_UNIT_NOT_FOUND.to_string()));
            }
            linked.push(unit_id);
        }

        let process = self
            .store
            .insert_process(&Process {
                id: 0,
                company_id,
                unit_id: owner.id,
                name,
                objective: draft.objective,
                deleted: false,
            })
            .await?;
        for unit_id in &linked {
            self.store
                .insert_process_unit(&ProcessUnit {
                    id: 0,
                    process_id: process.id,
                    unit_id: *unit_id,
                    deleted: false,
                })
                .await?;
        }
        info!("Created process {} linked to {} unit(s)", process.id, linked.len());
        Ok(process)
    }

    /// Processes linked to the unit, owned or not
    pub async fn list_by_unit(&self, company_id: i64, unit_id: i64) -> ServiceResult<PaginatedList<Process>> {
        let unit = Scope::new(self.store.as_ref(), company_id)
            .unit(unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;
        Ok(self.store.processes_by_unit(unit.id).await?.into())
    }

    pub async fn delete(&self, company_id: i64, process_id: i64) -> ServiceResult<Process> {
        let mut process = Scope::new(self.store.as_ref(), company_id)
            .process(process_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PROCESS_NOT_FOUND.to_string()))?;
        self.store.soft_delete(Table::Process, process.id).await?;
        process.deleted = true;
        info!("Deleted process {}", process.id);
        Ok(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PlanRisk, Unit};
    use crate::database::MemoryStore;

    async fn units(store: &MemoryStore, company_id: i64, count: usize) -> Vec<Unit> {
        let plan = store
            .insert_plan_risk(&PlanRisk {
                id: 0,
                company_id,
                name: "Plano 2024".into(),
                description: None,
                deleted: false,
            })
            .await
            .unwrap();
        let mut units = Vec::new();
        for i in 0..count {
            units.push(
                store
                    .insert_unit(&Unit {
                        id: 0,
                        plan_risk_id: plan.id,
                        parent_id: None,
                        user_id: 1,
                        name: format!("Unidade {}", i),
                        abbreviation: format!("U{}", i),
                        description: None,
                        deleted: false,
                    })
                    .await
                    .unwrap(),
            );
        }
        units
    }

    fn draft(unit_id: i64, related: Vec<i64>) -> ProcessDraft {
        ProcessDraft {
            unit_id,
            name: "Compras".into(),
            objective: Some("Adquirir insumos".into()),
            related_unit_ids: related,
        }
    }

    #[tokio::test]
    async fn process_is_listed_under_owner_and_related_units() {
        let store = Arc::new(MemoryStore::new());
        let units = units(&store, 1, 3).await;
        let service = ProcessService::new(store.clone());

        let process = service
            .create(1, draft(units[0].id, vec![units[1].id, units[0].id]))
            .await
            .unwrap();
        assert_eq!(process.unit_id, units[0].id);

        assert_eq!(service.list_by_unit(1, units[0].id).await.unwrap().list, vec![process.clone()]);
        assert_eq!(service.list_by_unit(1, units[1].id).await.unwrap().list, vec![process]);
        assert_eq!(service.list_by_unit(1, units[2].id).await.unwrap().total, 0);
        // Owner listed once even when repeated among related units
        assert_eq!(store.process_links_by_unit(units[0].id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_related_unit_aborts_creation() {
        let store = Arc::new(MemoryStore::new());
        let own = units(&store, 1, 1).await;
        let foreign = units(&store, 2, 1).await;
        let service = ProcessService::new(store.clone());

        let err = service
            .create(1, draft(own[0].id, vec![foreign[0].id]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref msg) if msg == RELATED_UNIT_NOT_FOUND));
        assert!(store.process_links_by_unit(own[0].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_process_is_no_longer_listed() {
        let store = Arc::new(MemoryStore::new());
        let units = units(&store, 1, 1).await;
        let service = ProcessService::new(store);

        let process = service.create(1, draft(units[0].id, vec![])).await.unwrap();
        assert!(matches!(service.delete(2, process.id).await, Err(ServiceError::NotFound(_))));
        service.delete(1, process.id).await.unwrap();
        assert_eq!(service.list_by_unit(1, units[0].id).await.unwrap().total, 0);
        assert!(matches!(service.delete(1, process.id).await, Err(ServiceError::NotFound(_))));
    }
}
