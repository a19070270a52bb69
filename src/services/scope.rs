use crate::database::models::{PlanRisk, Process, Risk, Unit, User};
use crate::database::Store;

use super::ServiceResult;

/// Tenant-scoped lookups.
///
/// Each helper returns `None` when the row is missing, soft-deleted, or
/// reachable only through another company's plan, so callers report all three
/// the same way.
pub struct Scope<'a> {
    store: &'a dyn Store,
    company_id: i64,
}

impl<'a> Scope<'a> {
    pub fn new(store: &'a dyn Store, company_id: i64) -> Self {
        Self { store, company_id }
    }

    pub fn company_id(&self) -> i64 {
        self.company_id
    }

    pub async fn plan(&self, plan_id: i64) -> ServiceResult<Option<PlanRisk>> {
        let plan = self.store.plan_risk(plan_id).await?;
        Ok(plan.filter(|plan| !plan.deleted && plan.company_id == self.company_id))
    }

    pub async fn unit(&self, unit_id: i64) -> ServiceResult<Option<Unit>> {
        let Some(unit) = self.store.unit(unit_id).await? else {
            return Ok(None);
        };
        if unit.deleted || self.plan(unit.plan_risk_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(unit))
    }

    pub async fn risk(&self, risk_id: i64) -> ServiceResult<Option<Risk>> {
        let Some(risk) = self.store.risk(risk_id).await? else {
            return Ok(None);
        };
        if risk.deleted || self.unit(risk.unit_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(risk))
    }

    pub async fn process(&self, process_id: i64) -> ServiceResult<Option<Process>> {
        let process = self.store.process(process_id).await?;
        Ok(process.filter(|process| !process.deleted && process.company_id == self.company_id))
    }

    pub async fn user(&self, user_id: i64) -> ServiceResult<Option<User>> {
        let user = self.store.user(user_id).await?;
        Ok(user.filter(|user| !user.deleted && user.company_id == self.company_id))
    }
}
