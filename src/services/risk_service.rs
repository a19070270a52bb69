use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::database::models::{
    Contingency, Incident, Monitor, PaginatedList, PreventiveAction, Risk, RiskActivity, RiskProcess, RiskStrategy,
};
use crate::database::{Store, Table};

use super::unit_service::{UNIT_NOT_FOUND, USER_NOT_FOUND};
use super::{required_text, Scope, ServiceError, ServiceResult};

pub const RISK_NOT_FOUND: &str = "O risco não foi encontrado.";
pub const ITEM_NOT_FOUND: &str = "O item solicitado não foi encontrado.";
pub const PROCESS_NOT_FOUND: &str = "O processo não foi encontrado.";
pub const UNKNOWN_COLLECTION: &str = "Coleção de risco desconhecida";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDraft {
    pub unit_id: i64,
    pub user_id: i64,
    pub code: String,
    pub name: String,
    pub probability: String,
    pub impact: String,
    pub periodicity: String,
    pub tipology: String,
    pub risk_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskUpdate {
    pub id: i64,
    pub user_id: i64,
    pub code: String,
    pub name: String,
    pub probability: String,
    pub impact: String,
    pub periodicity: String,
    pub tipology: String,
    pub risk_type: String,
}

/// Entity kinds reachable under `/api/risk/:id/:collection`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskCollection {
    Actions,
    Monitors,
    Incidents,
    Contingencies,
    Strategies,
    Activities,
    Processes,
}

impl RiskCollection {
    pub fn table(self) -> Table {
        match self {
            RiskCollection::Actions => Table::PreventiveAction,
            RiskCollection::Monitors => Table::Monitor,
            RiskCollection::Incidents => Table::Incident,
            RiskCollection::Contingencies => Table::Contingency,
            RiskCollection::Strategies => Table::RiskStrategy,
            RiskCollection::Activities => Table::RiskActivity,
            RiskCollection::Processes => Table::RiskProcess,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCollection::Actions => "actions",
            RiskCollection::Monitors => "monitors",
            RiskCollection::Incidents => "incidents",
            RiskCollection::Contingencies => "contingencies",
            RiskCollection::Strategies => "strategies",
            RiskCollection::Activities => "activities",
            RiskCollection::Processes => "processes",
        }
    }
}

impl FromStr for RiskCollection {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actions" => Ok(RiskCollection::Actions),
            "monitors" => Ok(RiskCollection::Monitors),
            "incidents" => Ok(RiskCollection::Incidents),
            "contingencies" => Ok(RiskCollection::Contingencies),
            "strategies" => Ok(RiskCollection::Strategies),
            "activities" => Ok(RiskCollection::Activities),
            "processes" => Ok(RiskCollection::Processes),
            _ => Err(ServiceError::NotFound(UNKNOWN_COLLECTION.to_string())),
        }
    }
}

impl fmt::Display for RiskCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a risk collection, serialized as the bare entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RiskItem {
    Action(PreventiveAction),
    Monitor(Monitor),
    Incident(Incident),
    Contingency(Contingency),
    Strategy(RiskStrategy),
    Activity(RiskActivity),
    Process(RiskProcess),
}

impl RiskItem {
    pub fn id(&self) -> i64 {
        match self {
            RiskItem::Action(item) => item.id,
            RiskItem::Monitor(item) => item.id,
            RiskItem::Incident(item) => item.id,
            RiskItem::Contingency(item) => item.id,
            RiskItem::Strategy(item) => item.id,
            RiskItem::Activity(item) => item.id,
            RiskItem::Process(item) => item.id,
        }
    }
}

// Request bodies per collection

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionBody {
    user_id: i64,
    action: String,
    #[serde(default)]
    accomplished: bool,
    validity_begin: Option<NaiveDate>,
    validity_end: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonitorBody {
    user_id: i64,
    report: String,
    probability: String,
    impact: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncidentBody {
    user_id: i64,
    #[serde(rename = "type")]
    incident_type: String,
    description: String,
    action: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContingencyBody {
    user_id: i64,
    action: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrategyBody {
    structure_id: Option<i64>,
    name: String,
    link_fpdi: Option<String>,
}

/// Shared by activities and process links
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessLinkBody {
    process_id: i64,
    name: String,
    link_fpdi: Option<String>,
}

fn parse_body<T: DeserializeOwned>(collection: RiskCollection, body: Value) -> ServiceResult<T> {
    serde_json::from_value(body).map_err(|e| {
        debug!("Invalid {} body: {}", collection, e);
        ServiceError::Rejected(format!("Dados inválidos para {}: {}", collection, e))
    })
}

pub struct RiskService {
    store: Arc<dyn Store>,
}

impl RiskService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn scope(&self, company_id: i64) -> Scope<'_> {
        Scope::new(self.store.as_ref(), company_id)
    }

    async fn ensure_user(&self, company_id: i64, user_id: i64) -> ServiceResult<()> {
        match self.scope(company_id).user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::Rejected(USER_NOT_FOUND.to_string())),
        }
    }

    pub async fn create(&self, company_id: i64, draft: RiskDraft) -> ServiceResult<Risk> {
        let unit = self
            .scope(company_id)
            .unit(draft.unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;
        self.ensure_user(company_id, draft.user_id).await?;

        let risk = self
            .store
            .insert_risk(&Risk {
                id: 0,
                unit_id: unit.id,
                user_id: draft.user_id,
                code: required_text(&draft.code, "code", "O código do risco é obrigatório")?,
                name: required_text(&draft.name, "name", "O nome do risco é obrigatório")?,
                probability: draft.probability,
                impact: draft.impact,
                periodicity: draft.periodicity,
                tipology: draft.tipology,
                risk_type: draft.risk_type,
                begin: Utc::now(),
                deleted: false,
            })
            .await?;
        info!("Created risk {} in unit {}", risk.id, unit.id);
        Ok(risk)
    }

    pub async fn get(&self, company_id: i64, risk_id: i64) -> ServiceResult<Risk> {
        self.scope(company_id)
            .risk(risk_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(RISK_NOT_FOUND.to_string()))
    }

    pub async fn list_by_unit(&self, company_id: i64, unit_id: i64) -> ServiceResult<PaginatedList<Risk>> {
        let unit = self
            .scope(company_id)
            .unit(unit_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(UNIT_NOT_FOUND.to_string()))?;
        Ok(self.store.risks_by_unit(unit.id).await?.into())
    }

    pub async fn update(&self, company_id: i64, update: RiskUpdate) -> ServiceResult<Risk> {
        let mut risk = self.get(company_id, update.id).await?;
        self.ensure_user(company_id, update.user_id).await?;

        risk.user_id = update.user_id;
        risk.code = required_text(&update.code, "code", "O código do risco é obrigatório")?;
        risk.name = required_text(&update.name, "name", "O nome do risco é obrigatório")?;
        risk.probability = update.probability;
        risk.impact = update.impact;
        risk.periodicity = update.periodicity;
        risk.tipology = update.tipology;
        risk.risk_type = update.risk_type;
        self.store.update_risk(&risk).await?;
        info!("Updated risk {}", risk.id);
        Ok(risk)
    }

    /// Soft-deletes the risk. Its collections become unreachable with it.
    pub async fn delete(&self, company_id: i64, risk_id: i64) -> ServiceResult<Risk> {
        let mut risk = self.get(company_id, risk_id).await?;
        self.store.soft_delete(Table::Risk, risk.id).await?;
        risk.deleted = true;
        info!("Deleted risk {}", risk.id);
        Ok(risk)
    }

    pub async fn list_items(
        &self,
        company_id: i64,
        risk_id: i64,
        collection: RiskCollection,
    ) -> ServiceResult<Vec<RiskItem>> {
        let risk = self.get(company_id, risk_id).await?;
        let store = self.store.as_ref();
        let items = match collection {
            RiskCollection::Actions => store.preventive_actions(risk.id).await?.into_iter().map(RiskItem::Action).collect(),
            RiskCollection::Monitors => store.monitors(risk.id).await?.into_iter().map(RiskItem::Monitor).collect(),
            RiskCollection::Incidents => store.incidents(risk.id).await?.into_iter().map(RiskItem::Incident).collect(),
            RiskCollection::Contingencies => {
                store.contingencies(risk.id).await?.into_iter().map(RiskItem::Contingency).collect()
            }
            RiskCollection::Strategies => {
                store.risk_strategies(risk.id).await?.into_iter().map(RiskItem::Strategy).collect()
            }
            RiskCollection::Activities => {
                store.risk_activities(risk.id).await?.into_iter().map(RiskItem::Activity).collect()
            }
            RiskCollection::Processes => {
                store.risk_processes(risk.id).await?.into_iter().map(RiskItem::Process).collect()
            }
        };
        Ok(items)
    }

    pub async fn add_item(
        &self,
        company_id: i64,
        risk_id: i64,
        collection: RiskCollection,
        body: Value,
    ) -> ServiceResult<RiskItem> {
        let risk = self.get(company_id, risk_id).await?;
        let store = self.store.as_ref();

        let item = match collection {
            RiskCollection::Actions => {
                let body: ActionBody = parse_body(collection, body)?;
                self.ensure_user(company_id, body.user_id).await?;
                RiskItem::Action(
                    store
                        .insert_preventive_action(&PreventiveAction {
                            id: 0,
                            risk_id: risk.id,
                            user_id: body.user_id,
                            action: required_text(&body.action, "action", "A ação é obrigatória")?,
                            accomplished: body.accomplished,
                            validity_begin: body.validity_begin,
                            validity_end: body.validity_end,
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Monitors => {
                let body: MonitorBody = parse_body(collection, body)?;
                self.ensure_user(company_id, body.user_id).await?;
                RiskItem::Monitor(
                    store
                        .insert_monitor(&Monitor {
                            id: 0,
                            risk_id: risk.id,
                            user_id: body.user_id,
                            report: body.report,
                            probability: body.probability,
                            impact: body.impact,
                            begin: Utc::now(),
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Incidents => {
                let body: IncidentBody = parse_body(collection, body)?;
                self.ensure_user(company_id, body.user_id).await?;
                RiskItem::Incident(
                    store
                        .insert_incident(&Incident {
                            id: 0,
                            risk_id: risk.id,
                            user_id: body.user_id,
                            incident_type: body.incident_type,
                            description: required_text(
                                &body.description,
                                "description",
                                "A descrição do incidente é obrigatória",
                            )?,
                            action: body.action,
                            begin: Utc::now(),
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Contingencies => {
                let body: ContingencyBody = parse_body(collection, body)?;
                self.ensure_user(company_id, body.user_id).await?;
                RiskItem::Contingency(
                    store
                        .insert_contingency(&Contingency {
                            id: 0,
                            risk_id: risk.id,
                            user_id: body.user_id,
                            action: required_text(&body.action, "action", "A ação é obrigatória")?,
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Strategies => {
                let body: StrategyBody = parse_body(collection, body)?;
                RiskItem::Strategy(
                    store
                        .insert_risk_strategy(&RiskStrategy {
                            id: 0,
                            risk_id: risk.id,
                            structure_id: body.structure_id,
                            name: required_text(&body.name, "name", "O nome do objetivo é obrigatório")?,
                            link_fpdi: body.link_fpdi,
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Activities => {
                let body: ProcessLinkBody = parse_body(collection, body)?;
                let process_id = self.company_process(company_id, body.process_id).await?;
                RiskItem::Activity(
                    store
                        .insert_risk_activity(&RiskActivity {
                            id: 0,
                            risk_id: risk.id,
                            process_id,
                            name: body.name,
                            link_fpdi: body.link_fpdi,
                            deleted: false,
                        })
                        .await?,
                )
            }
            RiskCollection::Processes => {
                let body: ProcessLinkBody = parse_body(collection, body)?;
                let process_id = self.company_process(company_id, body.process_id).await?;
                RiskItem::Process(
                    store
                        .insert_risk_process(&RiskProcess {
                            id: 0,
                            risk_id: risk.id,
                            process_id,
                            name: body.name,
                            link_fpdi: body.link_fpdi,
                            deleted: false,
                        })
                        .await?,
                )
            }
        };

        info!("Added {} item {} to risk {}", collection, item.id(), risk.id);
        Ok(item)
    }

    async fn company_process(&self, company_id: i64, process_id: i64) -> ServiceResult<i64> {
        self.scope(company_id)
            .process(process_id)
            .await?
            .map(|process| process.id)
            .ok_or_else(|| ServiceError::Rejected(PROCESS_NOT_FOUND.to_string()))
    }

    /// Items of another risk (or already deleted) are reported as missing
    pub async fn remove_item(
        &self,
        company_id: i64,
        risk_id: i64,
        collection: RiskCollection,
        item_id: i64,
    ) -> ServiceResult<()> {
        let risk = self.get(company_id, risk_id).await?;
        let table = collection.table();
        if self.store.risk_child_owner(table, item_id).await? != Some(risk.id) {
            return Err(ServiceError::NotFound(ITEM_NOT_FOUND.to_string()));
        }
        self.store.soft_delete(table, item_id).await?;
        info!("Removed {} item {} from risk {}", collection, item_id, risk.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PlanRisk, Process, Unit, User};
    use crate::database::MemoryStore;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: RiskService,
        unit: Unit,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store
            .seed_user(User {
                id: 500,
                company_id: 1,
                name: "Bruno".into(),
                email: "bruno@example.com".into(),
                access_level: 20,
                deleted: false,
            })
            .await;
        let plan = store
            .insert_plan_risk(&PlanRisk {
                id: 0,
                company_id: 1,
                name: "Plano 2024".into(),
                description: None,
                deleted: false,
            })
            .await
            .unwrap();
        let unit = store
            .insert_unit(&Unit {
                id: 0,
                plan_risk_id: plan.id,
                parent_id: None,
                user_id: 500,
                name: "Reitoria".into(),
                abbreviation: "REI".into(),
                description: None,
                deleted: false,
            })
            .await
            .unwrap();
        Fixture {
            service: RiskService::new(store.clone()),
            store,
            unit,
        }
    }

    fn draft(unit_id: i64) -> RiskDraft {
        RiskDraft {
            unit_id,
            user_id: 500,
            code: "R01".into(),
            name: "Falha no fornecimento".into(),
            probability: "Alta".into(),
            impact: "Alto".into(),
            periodicity: "Mensal".into(),
            tipology: "Operacional".into(),
            risk_type: "Ameaça".into(),
        }
    }

    #[test]
    fn collection_names_parse() {
        assert_eq!("incidents".parse::<RiskCollection>().unwrap(), RiskCollection::Incidents);
        assert_eq!(RiskCollection::Processes.table(), Table::RiskProcess);
        assert!("risks".parse::<RiskCollection>().is_err());
    }

    #[tokio::test]
    async fn risk_needs_a_visible_unit_and_user() {
        let fx = fixture().await;
        let err = fx.service.create(2, draft(fx.unit.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref msg) if msg == UNIT_NOT_FOUND));

        let mut bad_user = draft(fx.unit.id);
        bad_user.user_id = 9_999;
        let err = fx.service.create(1, bad_user).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref msg) if msg == USER_NOT_FOUND));

        let risk = fx.service.create(1, draft(fx.unit.id)).await.unwrap();
        assert_eq!(fx.service.list_by_unit(1, fx.unit.id).await.unwrap().list, vec![risk]);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let fx = fixture().await;
        let risk = fx.service.create(1, draft(fx.unit.id)).await.unwrap();

        let updated = fx
            .service
            .update(
                1,
                RiskUpdate {
                    id: risk.id,
                    user_id: 500,
                    code: "R02".into(),
                    name: "Falha no transporte".into(),
                    probability: "Baixa".into(),
                    impact: "Médio".into(),
                    periodicity: "Anual".into(),
                    tipology: "Operacional".into(),
                    risk_type: "Ameaça".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.code, "R02");
        assert_eq!(fx.service.get(1, risk.id).await.unwrap().name, "Falha no transporte");

        fx.service.delete(1, risk.id).await.unwrap();
        assert!(matches!(fx.service.get(1, risk.id).await, Err(ServiceError::NotFound(_))));
        assert_eq!(fx.service.list_by_unit(1, fx.unit.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn collection_items_are_added_listed_and_removed() {
        let fx = fixture().await;
        let risk = fx.service.create(1, draft(fx.unit.id)).await.unwrap();

        let item = fx
            .service
            .add_item(1, risk.id, RiskCollection::Incidents, json!({
                "userId": 500,
                "type": "Ameaça",
                "description": "Atraso de entrega"
            }))
            .await
            .unwrap();
        let listed = fx.service.list_items(1, risk.id, RiskCollection::Incidents).await.unwrap();
        assert_eq!(listed, vec![item.clone()]);

        // Right id, wrong collection
        let err = fx
            .service
            .remove_item(1, risk.id, RiskCollection::Monitors, item.id())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        fx.service
            .remove_item(1, risk.id, RiskCollection::Incidents, item.id())
            .await
            .unwrap();
        assert!(fx.service.list_items(1, risk.id, RiskCollection::Incidents).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_item_body_is_rejected() {
        let fx = fixture().await;
        let risk = fx.service.create(1, draft(fx.unit.id)).await.unwrap();
        let err = fx
            .service
            .add_item(1, risk.id, RiskCollection::Actions, json!({ "accomplished": true }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
    }

    #[tokio::test]
    async fn process_links_must_stay_inside_the_company() {
        let fx = fixture().await;
        let risk = fx.service.create(1, draft(fx.unit.id)).await.unwrap();
        let foreign = fx
            .store
            .insert_process(&Process {
                id: 0,
                company_id: 2,
                unit_id: 77,
                name: "Folha de pagamento".into(),
                objective: None,
                deleted: false,
            })
            .await
            .unwrap();
        let own = fx
            .store
            .insert_process(&Process {
                id: 0,
                company_id: 1,
                unit_id: fx.unit.id,
                name: "Compras".into(),
                objective: None,
                deleted: false,
            })
            .await
            .unwrap();

        let err = fx
            .service
            .add_item(1, risk.id, RiskCollection::Activities, json!({ "processId": foreign.id, "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(ref msg) if msg == PROCESS_NOT_FOUND));

        let item = fx
            .service
            .add_item(1, risk.id, RiskCollection::Processes, json!({ "processId": own.id, "name": "Compras" }))
            .await
            .unwrap();
        assert!(matches!(item, RiskItem::Process(ref link) if link.process_id == own.id));
    }
}
