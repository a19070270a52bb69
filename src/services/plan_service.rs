use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::database::models::{PaginatedList, PlanRisk};
use crate::database::{Store, Table};

use super::{required_text, Scope, ServiceError, ServiceResult};

pub const PLAN_NOT_FOUND: &str = "O Plano de Risco não foi encontrado";
pub const PLAN_HAS_UNITS: &str = "O plano possui unidades, portanto não pode ser excluído.";
const NAME_REQUIRED: &str = "O nome do plano é obrigatório";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

pub struct PlanService {
    store: Arc<dyn Store>,
}

impl PlanService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, company_id: i64, draft: PlanDraft) -> ServiceResult<PlanRisk> {
        let name = required_text(&draft.name, "name", NAME_REQUIRED)?;
        let plan = self
            .store
            .insert_plan_risk(&PlanRisk {
                id: 0,
                company_id,
                name,
                description: draft.description,
                deleted: false,
            })
            .await?;
        info!("Created plan risk {} for company {}", plan.id, company_id);
        Ok(plan)
    }

    pub async fn get(&self, company_id: i64, plan_id: i64) -> ServiceResult<PlanRisk> {
        Scope::new(self.store.as_ref(), company_id)
            .plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PLAN_NOT_FOUND.to_string()))
    }

    pub async fn list(&self, company_id: i64) -> ServiceResult<PaginatedList<PlanRisk>> {
        Ok(self.store.plan_risks_by_company(company_id).await?.into())
    }

    pub async fn update(&self, company_id: i64, update: PlanUpdate) -> ServiceResult<PlanRisk> {
        let mut plan = self.get(company_id, update.id).await?;
        plan.name = required_text(&update.name, "name", NAME_REQUIRED)?;
        plan.description = update.description;
        self.store.update_plan_risk(&plan).await?;
        info!("Updated plan risk {}", plan.id);
        Ok(plan)
    }

    pub async fn delete(&self, company_id: i64, plan_id: i64) -> ServiceResult<PlanRisk> {
        let mut plan = self.get(company_id, plan_id).await?;
        if !self.store.units_by_plan(plan.id).await?.is_empty() {
            return Err(ServiceError::Rejected(PLAN_HAS_UNITS.to_string()));
        }
        self.store.soft_delete(Table::PlanRisk, plan.id).await?;
        plan.deleted = true;
        info!("Deleted plan risk {}", plan.id);
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Unit;
    use crate::database::MemoryStore;

    fn service() -> (Arc<MemoryStore>, PlanService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), PlanService::new(store))
    }

    #[tokio::test]
    async fn blank_name_is_invalid() {
        let (_, service) = service();
        let err = service
            .create(1, PlanDraft { name: "   ".into(), description: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn plans_are_scoped_to_their_company() {
        let (_, service) = service();
        let plan = service
            .create(1, PlanDraft { name: "Plano 2024".into(), description: None })
            .await
            .unwrap();

        assert!(service.get(1, plan.id).await.is_ok());
        assert!(matches!(service.get(2, plan.id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(service.list(2).await.unwrap().total, 0);
        assert_eq!(service.list(1).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn plan_with_units_cannot_be_deleted() {
        let (store, service) = service();
        let plan = service
            .create(1, PlanDraft { name: "Plano 2024".into(), description: None })
            .await
            .unwrap();
        store
            .insert_unit(&Unit {
                id: 0,
                plan_risk_id: plan.id,
                parent_id: None,
                user_id: 1,
                name: "Reitoria".into(),
                abbreviation: "REI".into(),
                description: None,
                deleted: false,
            })
            .await
            .unwrap();

        let err = service.delete(1, plan.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref msg) if msg == PLAN_HAS_UNITS));
    }

    #[tokio::test]
    async fn deleted_plan_disappears() {
        let (_, service) = service();
        let plan = service
            .create(1, PlanDraft { name: "Plano 2024".into(), description: None })
            .await
            .unwrap();
        assert!(service.delete(1, plan.id).await.unwrap().deleted);
        assert!(matches!(service.get(1, plan.id).await, Err(ServiceError::NotFound(_))));
    }
}
