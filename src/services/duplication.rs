use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::database::models::risk::RiskChild;
use crate::database::models::{PlanRisk, ProcessUnit, Risk, Unit};
use crate::database::{Store, Table};

use super::{Scope, ServiceResult};

/// Original id → newly assigned id, per table.
///
/// Lives for a single duplication or restore request.
#[derive(Debug, Default)]
pub struct IdTranslation {
    ids: HashMap<(Table, i64), i64>,
}

impl IdTranslation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: Table, original: i64, assigned: i64) {
        self.ids.insert((table, original), assigned);
    }

    pub fn get(&self, table: Table, original: i64) -> Option<i64> {
        self.ids.get(&(table, original)).copied()
    }

    pub fn contains(&self, table: Table, original: i64) -> bool {
        self.ids.contains_key(&(table, original))
    }

    pub fn count(&self, table: Table) -> usize {
        self.ids.keys().filter(|(t, _)| *t == table).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DuplicationSummary {
    pub units: usize,
    pub risks: usize,
}

/// Copies the requested units and their direct subunits into `plan`, then
/// re-links their processes and copies their risks.
///
/// Missing, deleted or foreign units are skipped, as are units already copied
/// earlier in the same request.
pub(crate) async fn duplicate_units(
    store: &dyn Store,
    company_id: i64,
    plan: &PlanRisk,
    unit_ids: &[i64],
) -> ServiceResult<DuplicationSummary> {
    let scope = Scope::new(store, company_id);
    let mut translation = IdTranslation::new();
    let mut copies: Vec<(Unit, Unit)> = Vec::new();

    for &unit_id in unit_ids {
        if translation.contains(Table::Unit, unit_id) {
            continue;
        }
        let Some(original) = scope.unit(unit_id).await? else {
            debug!("Skipping unit {} during duplication", unit_id);
            continue;
        };

        let parent = original
            .parent_id
            .and_then(|parent_id| translation.get(Table::Unit, parent_id));
        let copy = store.insert_unit(&original.duplicate_into(plan.id, parent)).await?;
        translation.record(Table::Unit, original.id, copy.id);
        let subunits = store.subunits(original.id).await?;
        let copy_id = copy.id;
        copies.push((original, copy));

        for subunit in subunits {
            if translation.contains(Table::Unit, subunit.id) {
                continue;
            }
            let sub_copy = store.insert_unit(&subunit.duplicate_into(plan.id, Some(copy_id))).await?;
            translation.record(Table::Unit, subunit.id, sub_copy.id);
            copies.push((subunit, sub_copy));
        }
    }

    let mut risks = 0;
    for (original, copy) in &copies {
        link_processes(store, original, copy).await?;
        for risk in store.risks_by_unit(original.id).await? {
            copy_risk(store, &risk, copy.id).await?;
            risks += 1;
        }
    }

    let summary = DuplicationSummary {
        units: translation.count(Table::Unit),
        risks,
    };
    info!(
        "Duplicated {} units and {} risks into plan {}",
        summary.units, summary.risks, plan.id
    );
    Ok(summary)
}

/// Processes are shared: the copy gets new links to the same processes
async fn link_processes(store: &dyn Store, original: &Unit, copy: &Unit) -> ServiceResult<()> {
    for process in store.processes_by_unit(original.id).await? {
        store
            .insert_process_unit(&ProcessUnit {
                id: 0,
                process_id: process.id,
                unit_id: copy.id,
                deleted: false,
            })
            .await?;
    }
    Ok(())
}

async fn copy_risk(store: &dyn Store, risk: &Risk, unit_id: i64) -> ServiceResult<Risk> {
    let copy = store.insert_risk(&risk.duplicate_into(unit_id)).await?;

    for item in store.preventive_actions(risk.id).await? {
        store.insert_preventive_action(&item.attached_to(copy.id)).await?;
    }
    for item in store.monitors(risk.id).await? {
        store.insert_monitor(&item.attached_to(copy.id)).await?;
    }
    for item in store.incidents(risk.id).await? {
        store.insert_incident(&item.attached_to(copy.id)).await?;
    }
    for item in store.contingencies(risk.id).await? {
        store.insert_contingency(&item.attached_to(copy.id)).await?;
    }
    for item in store.risk_strategies(risk.id).await? {
        store.insert_risk_strategy(&item.attached_to(copy.id)).await?;
    }
    for item in store.risk_activities(risk.id).await? {
        store.insert_risk_activity(&item.attached_to(copy.id)).await?;
    }
    for item in store.risk_processes(risk.id).await? {
        store.insert_risk_process(&item.attached_to(copy.id)).await?;
    }

    debug!("Copied risk {} to {} under unit {}", risk.id, copy.id, unit_id);
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Incident, Monitor, PreventiveAction, Process, RiskActivity, User};
    use crate::database::MemoryStore;
    use chrono::Utc;

    async fn plan(store: &MemoryStore, company_id: i64, name: &str) -> PlanRisk {
        store
            .insert_plan_risk(&PlanRisk {
                id: 0,
                company_id,
                name: name.into(),
                description: None,
                deleted: false,
            })
            .await
            .unwrap()
    }

    async fn unit(store: &MemoryStore, plan_id: i64, parent_id: Option<i64>, name: &str) -> Unit {
        store
            .insert_unit(&Unit {
                id: 0,
                plan_risk_id: plan_id,
                parent_id,
                user_id: 1,
                name: name.into(),
                abbreviation: name[..3].to_uppercase(),
                description: Some(format!("Unidade {}", name)),
                deleted: false,
            })
            .await
            .unwrap()
    }

    async fn risk(store: &MemoryStore, unit_id: i64, code: &str) -> Risk {
        store
            .insert_risk(&Risk {
                id: 0,
                unit_id,
                user_id: 1,
                code: code.into(),
                name: format!("Risco {}", code),
                probability: "Média".into(),
                impact: "Alto".into(),
                periodicity: "Trimestral".into(),
                tipology: "Operacional".into(),
                risk_type: "Ameaça".into(),
                begin: Utc::now(),
                deleted: false,
            })
            .await
            .unwrap()
    }

    /// Source plan with one unit, one subunit, a process, and one fully populated risk
    async fn populated_store() -> (MemoryStore, PlanRisk, Unit, Unit, Process) {
        let store = MemoryStore::new();
        store
            .seed_user(User {
                id: 1,
                company_id: 1,
                name: "Ana".into(),
                email: "ana@example.com".into(),
                access_level: 20,
                deleted: false,
            })
            .await;
        let source = plan(&store, 1, "Plano 2023").await;
        let parent = unit(&store, source.id, None, "Reitoria").await;
        let child = unit(&store, source.id, Some(parent.id), "Gabinete").await;

        let process = store
            .insert_process(&Process {
                id: 0,
                company_id: 1,
                unit_id: parent.id,
                name: "Compras".into(),
                objective: None,
                deleted: false,
            })
            .await
            .unwrap();
        store
            .insert_process_unit(&ProcessUnit { id: 0, process_id: process.id, unit_id: parent.id, deleted: false })
            .await
            .unwrap();

        let r = risk(&store, parent.id, "R1").await;
        store
            .insert_preventive_action(&PreventiveAction {
                id: 0,
                risk_id: r.id,
                user_id: 1,
                action: "Revisar contratos".into(),
                accomplished: false,
                validity_begin: None,
                validity_end: None,
                deleted: false,
            })
            .await
            .unwrap();
        store
            .insert_monitor(&Monitor {
                id: 0,
                risk_id: r.id,
                user_id: 1,
                report: "Sem ocorrências".into(),
                probability: "Baixa".into(),
                impact: "Médio".into(),
                begin: Utc::now(),
                deleted: false,
            })
            .await
            .unwrap();
        store
            .insert_risk_activity(&RiskActivity {
                id: 0,
                risk_id: r.id,
                process_id: process.id,
                name: "Cotação".into(),
                link_fpdi: None,
                deleted: false,
            })
            .await
            .unwrap();
        risk(&store, child.id, "R2").await;

        (store, source, parent, child, process)
    }

    #[tokio::test]
    async fn copies_units_subunits_risks_and_children() {
        let (store, _, parent, _, process) = populated_store().await;
        let target = plan(&store, 1, "Plano 2024").await;

        let summary = duplicate_units(&store, 1, &target, &[parent.id]).await.unwrap();
        assert_eq!(summary, DuplicationSummary { units: 2, risks: 2 });

        let copied = store.units_by_plan(target.id).await.unwrap();
        assert_eq!(copied.len(), 2);
        let new_parent = copied.iter().find(|u| u.parent_id.is_none()).unwrap();
        let new_child = copied.iter().find(|u| u.parent_id.is_some()).unwrap();
        assert_eq!(new_parent.name, "Reitoria");
        assert_eq!(new_child.parent_id, Some(new_parent.id));
        assert_ne!(new_parent.id, parent.id);

        let new_risks = store.risks_by_unit(new_parent.id).await.unwrap();
        assert_eq!(new_risks.len(), 1);
        let new_risk = &new_risks[0];
        assert_eq!(new_risk.code, "R1");
        assert_eq!(store.preventive_actions(new_risk.id).await.unwrap().len(), 1);
        assert_eq!(store.monitors(new_risk.id).await.unwrap().len(), 1);
        let activities = store.risk_activities(new_risk.id).await.unwrap();
        assert_eq!(activities[0].process_id, process.id);
        assert_eq!(store.risks_by_unit(new_child.id).await.unwrap().len(), 1);

        // Processes are linked, not copied
        assert_eq!(store.processes_by_unit(new_parent.id).await.unwrap(), vec![process]);
    }

    #[tokio::test]
    async fn incidents_stay_with_their_own_risk() {
        let store = MemoryStore::new();
        let source = plan(&store, 1, "Plano 2023").await;
        let u = unit(&store, source.id, None, "Reitoria").await;
        let first = risk(&store, u.id, "R1").await;
        risk(&store, u.id, "R2").await;
        store
            .insert_incident(&Incident {
                id: 0,
                risk_id: first.id,
                user_id: 1,
                incident_type: "Ameaça".into(),
                description: "Atraso na entrega".into(),
                action: None,
                begin: Utc::now(),
                deleted: false,
            })
            .await
            .unwrap();

        let target = plan(&store, 1, "Plano 2024").await;
        duplicate_units(&store, 1, &target, &[u.id]).await.unwrap();

        let copy = &store.units_by_plan(target.id).await.unwrap()[0];
        let risks = store.risks_by_unit(copy.id).await.unwrap();
        let counts = incident_counts(&store, &risks).await;
        assert_eq!(counts, vec![1, 0]);
    }

    async fn incident_counts(store: &MemoryStore, risks: &[Risk]) -> Vec<usize> {
        let mut counts = Vec::new();
        for risk in risks {
            counts.push(store.incidents(risk.id).await.unwrap().len());
        }
        counts
    }

    #[tokio::test]
    async fn skips_missing_foreign_and_repeated_units() {
        let (store, _, parent, child, _) = populated_store().await;
        let foreign_plan = plan(&store, 2, "Outra empresa").await;
        let foreign = unit(&store, foreign_plan.id, None, "Estrangeira").await;
        let target = plan(&store, 1, "Plano 2024").await;

        let summary = duplicate_units(&store, 1, &target, &[parent.id, child.id, parent.id, foreign.id, 9_999])
            .await
            .unwrap();
        assert_eq!(summary.units, 2);
        assert_eq!(store.units_by_plan(target.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn each_request_uses_its_own_translation() {
        let (store, _, parent, _, _) = populated_store().await;
        let first = plan(&store, 1, "Plano A").await;
        let second = plan(&store, 1, "Plano B").await;

        duplicate_units(&store, 1, &first, &[parent.id]).await.unwrap();
        let summary = duplicate_units(&store, 1, &second, &[parent.id]).await.unwrap();
        assert_eq!(summary.units, 2);

        for target in [first, second] {
            let units = store.units_by_plan(target.id).await.unwrap();
            let top = units.iter().find(|u| u.parent_id.is_none()).unwrap();
            let sub = units.iter().find(|u| u.parent_id.is_some()).unwrap();
            assert_eq!(sub.parent_id, Some(top.id), "subunit must point at the copy in its own plan");
        }
    }
}
