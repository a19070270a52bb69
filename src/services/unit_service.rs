use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::database::models::{PaginatedList, PlanRisk, Unit};
use crate::database::{Store, Table};

use super::duplication::{self, DuplicationSummary};
use super::plan_service::PLAN_NOT_FOUND;
use super::{required_text, Scope, ServiceError, ServiceResult};

pub const UNIT_WITHOUT_PLAN: &str = "Unidade não possui Plano de Risco";
pub const UNIT_WITHOUT_PARENT: &str = "Unidade não possui unidade pai";
pub const PARENT_IS_SUBUNIT: &str = "A unidade pai não pode ser uma subunidade";
pub const UNIT_NOT_FOUND: &str = "A unidade não foi encontrada.";
pub const SUBUNIT_PARENT_NOT_FOUND: &str = "A unidade não foi encontrada";
pub const REQUESTED_UNIT_NOT_FOUND: &str = "A unidade solicitada não foi encontrado.";
pub const UNIT_NOT_DELETABLE: &str = "A unidade possuiu riscos ou subunidades, portanto não pode ser excluida.";
pub const USER_NOT_FOUND: &str = "O usuário responsável não foi encontrado.";
pub const SEARCH_PLAN_NOT_FOUND: &str = "plano não foi encontrado";

/// Unit as submitted by `POST /api/unit/new` and `POST /api/unit/subnew`.
/// Any client-supplied id is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDraft {
    pub name: String,
    pub abbreviation: String,
    pub description: Option<String>,
    pub user_id: i64,
    pub plan_risk_id: Option<i64>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitUpdate {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub description: Option<String>,
    pub user_id: i64,
}

/// Term search over the units of one plan
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub plan_risk_id: i64,
    pub terms: Option<String>,
    /// Restricts matches to these unit ids when present
    pub selected: Option<Vec<i64>>,
    /// 1 ascending by name, 2 descending by name, anything else by id
    pub ord_result: Option<i32>,
    /// 1-based page, only meaningful together with `limit`
    pub page: Option<i64>,
    pub limit: Option<u64>,
}

pub struct UnitService {
    store: Arc<dyn Store>,
}

impl UnitService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn scope(&self, company_id: i64) -> Scope<'_> {
        Scope::new(self.store.as_ref(), company_id)
    }

    async fn plan_or(&self, company_id: i64, plan_id: i64, message: &str) -> ServiceResult<PlanRisk> {
        self.scope(company_id)
            .plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(message.to_string()))
    }

    async fn validated_fields(&self, company_id: i64, draft: &UnitDraft) -> ServiceResult<(String, String)> {
        let name = required_text(&draft.name, "name", "O nome da unidade é obrigatório")?;
        let abbreviation = required_text(&draft.abbreviation, "abbreviation", "A sigla da unidade é obrigatória")?;
        if self.scope(company_id).user(draft.user_id).await?.is_none() {
            return Err(ServiceError::Rejected(USER_NOT_FOUND.to_string()));
        }
        Ok((name, abbreviation))
    }

    /// Top-level unit. A parent in the draft is ignored.
    pub async fn create_unit(&self, company_id: i64, draft: UnitDraft) -> ServiceResult<Unit> {
        let plan = match draft.plan_risk_id {
            Some(plan_id) => self.scope(company_id).plan(plan_id).await?,
            None => None,
        }
        .ok_or_else(|| ServiceError::Rejected(UNIT_WITHOUT_PLAN.to_string()))?;

        let (name, abbreviation) = self.validated_fields(company_id, &draft).await?;
        let unit = self
            .store
            .insert_unit(&Unit {
                id: 0,
                plan_risk_id: plan.id,
                parent_id: None,
                user_id: draft.user_id,
                name,
                abbreviation,
                description: draft.description,
                deleted: false,
            })
            .await?;
        info!("Created unit {} in plan {}", unit.id, plan.id);
        Ok(unit)
    }

    pub async fn create_subunit(&self, company_id: i64, draft: UnitDraft) -> ServiceResult<Unit> {
        let plan_id = draft
            .plan_risk_id
            .ok_or_else(|| ServiceError::Rejected(UNIT_WITHOUT_PLAN.to_string()))?;
        let parent_id = draft
            .parent_id
            .ok_or_else(|| ServiceError::Rejected(UNIT_WITHOUT_PARENT.to_string()))?;

        let scope = self.scope(company_id);
        let plan = scope
            .plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::Rejected(UNIT_WITHOUT_PLAN.to_string()))?;
        let parent = scope
            .unit(parent_id)
            .await?
            .filter(|parent| parent.plan_risk_id == plan.id)
            .ok_or_else(|| ServiceError::Rejected(UNIT_WITHOUT_PARENT.to_string()))?;
        if parent.is_subunit() {
            return Err(ServiceError::Rejected(PARENT_IS_SUBUNIT.to_string()));
        }

        let (name, abbreviation) = self.validated_fields(company_id, &draft).await?;
        let unit = self
            .store
            .insert_unit(&Unit {
                id: 0,
                plan_risk_id: plan.id,
                parent_id: Some(parent.id),
                user_id: draft.user_id,
                name,
                abbreviation,
                description: draft.description,
                deleted: false,
            })
            .await?;
        info!("Created subunit {} under unit {}", unit.id, parent.id);
        Ok(unit)
    }

    pub async fn get_unit(&self, company_id: i64, unit_id: i64) -> ServiceResult<Unit> {
        self.scope(company_id)
            .unit(unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(REQUESTED_UNIT_NOT_FOUND.to_string()))
    }

    /// Top-level units of a plan
    pub async fn list_units(&self, company_id: i64, plan_id: i64) -> ServiceResult<PaginatedList<Unit>> {
        let plan = self.plan_or(company_id, plan_id, PLAN_NOT_FOUND).await?;
        let units: Vec<Unit> = self
            .store
            .units_by_plan(plan.id)
            .await?
            .into_iter()
            .filter(|unit| !unit.is_subunit())
            .collect();
        Ok(units.into())
    }

    pub async fn list_subunits(&self, company_id: i64, unit_id: i64) -> ServiceResult<PaginatedList<Unit>> {
        let unit = self
            .scope(company_id)
            .unit(unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(SUBUNIT_PARENT_NOT_FOUND.to_string()))?;
        Ok(self.store.subunits(unit.id).await?.into())
    }

    pub async fn list_subunits_by_plan(&self, company_id: i64, plan_id: i64) -> ServiceResult<PaginatedList<Unit>> {
        let plan = self.plan_or(company_id, plan_id, PLAN_NOT_FOUND).await?;
        let subunits: Vec<Unit> = self
            .store
            .units_by_plan(plan.id)
            .await?
            .into_iter()
            .filter(Unit::is_subunit)
            .collect();
        Ok(subunits.into())
    }

    pub async fn list_all_units_by_plan(&self, company_id: i64, plan_id: i64) -> ServiceResult<PaginatedList<Unit>> {
        let plan = self.plan_or(company_id, plan_id, PLAN_NOT_FOUND).await?;
        Ok(self.store.units_by_plan(plan.id).await?.into())
    }

    /// Soft-deletes a unit without risks or subunits.
    ///
    /// Processes owned by the unit go with it; links to processes owned
    /// elsewhere are dropped.
    pub async fn delete_unit(&self, company_id: i64, unit_id: i64) -> ServiceResult<Unit> {
        let mut unit = self
            .scope(company_id)
            .unit(unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;

        if !self.deletable(&unit).await? {
            return Err(ServiceError::Rejected(UNIT_NOT_DELETABLE.to_string()));
        }

        for link in self.store.process_links_by_unit(unit.id).await? {
            if let Some(process) = self.store.process(link.process_id).await? {
                if process.unit_id == unit.id && !process.deleted {
                    self.store.soft_delete(Table::Process, process.id).await?;
                    debug!("Deleted process {} owned by unit {}", process.id, unit.id);
                }
            }
            self.store.soft_delete(Table::ProcessUnit, link.id).await?;
        }

        self.store.soft_delete(Table::Unit, unit.id).await?;
        unit.deleted = true;
        info!("Deleted unit {}", unit.id);
        Ok(unit)
    }

    async fn deletable(&self, unit: &Unit) -> ServiceResult<bool> {
        Ok(self.store.risks_by_unit(unit.id).await?.is_empty() && self.store.subunits(unit.id).await?.is_empty())
    }

    pub async fn update_unit(&self, company_id: i64, update: UnitUpdate) -> ServiceResult<Unit> {
        let scope = self.scope(company_id);
        let mut unit = scope
            .unit(update.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;
        let user = scope
            .user(update.user_id)
            .await?
            .ok_or_else(|| ServiceError::Rejected(USER_NOT_FOUND.to_string()))?;

        unit.name = required_text(&update.name, "name", "O nome da unidade é obrigatório")?;
        unit.abbreviation = required_text(&update.abbreviation, "abbreviation", "A sigla da unidade é obrigatória")?;
        unit.user_id = user.id;
        unit.description = update.description;

        self.store.update_unit(&unit).await?;
        info!("Updated unit {}", unit.id);
        Ok(unit)
    }

    pub async fn search(&self, company_id: i64, params: SearchParams) -> ServiceResult<PaginatedList<Unit>> {
        let plan = self
            .plan_or(company_id, params.plan_risk_id, SEARCH_PLAN_NOT_FOUND)
            .await?;
        let units = self.store.units_by_plan(plan.id).await?;
        let matches = filter_units(units, params.terms.as_deref(), params.selected.as_deref(), params.ord_result);
        Ok(paginate(matches, params.page, params.limit))
    }

    /// Copies units with their subunits, risks and process links into another plan
    pub async fn duplicate(&self, company_id: i64, plan_id: i64, unit_ids: &[i64]) -> ServiceResult<DuplicationSummary> {
        let plan = self
            .plan_or(company_id, plan_id, "Plano de Risco não encontrado")
            .await?;
        duplication::duplicate_units(self.store.as_ref(), company_id, &plan, unit_ids).await
    }
}

fn filter_units(units: Vec<Unit>, terms: Option<&str>, selected: Option<&[i64]>, ord_result: Option<i32>) -> Vec<Unit> {
    let needle = terms.map(str::trim).filter(|t| !t.is_empty()).map(str::to_lowercase);
    let selected: Option<HashSet<i64>> = selected.map(|ids| ids.iter().copied().collect());

    let mut matches: Vec<Unit> = units
        .into_iter()
        .filter(|unit| selected.as_ref().map_or(true, |ids| ids.contains(&unit.id)))
        .filter(|unit| match &needle {
            Some(needle) => {
                unit.name.to_lowercase().contains(needle.as_str())
                    || unit.abbreviation.to_lowercase().contains(needle.as_str())
            }
            None => true,
        })
        .collect();

    let by_name = |a: &Unit, b: &Unit| -> Ordering {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id))
    };
    match ord_result {
        Some(1) => matches.sort_by(by_name),
        Some(2) => matches.sort_by(|a, b| by_name(b, a)),
        _ => matches.sort_by_key(|unit| unit.id),
    }
    matches
}

/// Page `page` (1-based) of `limit` items; everything when there is no limit.
/// `total` always counts every match.
fn paginate<T>(items: Vec<T>, page: Option<i64>, limit: Option<u64>) -> PaginatedList<T> {
    let total = items.len() as u64;
    let Some(limit) = limit else {
        return PaginatedList::new(items, total);
    };

    let page = page.unwrap_or(1).max(1) as u64;
    let first = (page - 1).saturating_mul(limit);
    let list = items
        .into_iter()
        .skip(usize::try_from(first).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    PaginatedList::new(list, total)
}
