use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Company, Contingency, Incident, Monitor, PlanRisk, PreventiveAction, Process, ProcessUnit, Risk,
    RiskActivity, RiskProcess, RiskStrategy, Unit, User,
};
use crate::database::store::{Store, StoreTransaction, Table};

enum Conn {
    Pool(PgPool),
    Tx(Mutex<Transaction<'static, Postgres>>),
}

/// Runs `$query.$method(..)` against the pool, or inside the open transaction
macro_rules! run {
    ($self:ident, $query:expr, $method:ident) => {
        match &$self.conn {
            Conn::Pool(pool) => $query.$method(pool).await,
            Conn::Tx(tx) => {
                let mut tx = tx.lock().await;
                $query.$method(&mut **tx).await
            }
        }
    };
}

/// PostgreSQL-backed store
pub struct PgStore {
    conn: Conn,
}

/// Same queries as `PgStore`, all on one `sqlx::Transaction`
struct PgTransaction {
    staging: PgStore,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    fn store(&self) -> &dyn Store {
        &self.staging
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        match self.staging.conn {
            Conn::Tx(tx) => Ok(tx.into_inner().commit().await?),
            Conn::Pool(_) => Ok(()),
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { conn: Conn::Pool(pool) }
    }

    async fn find_by_id<T>(&self, table: Table, id: i64) -> Result<Option<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = format!("SELECT * FROM {} WHERE id = $1", table.name());
        Ok(run!(self, sqlx::query_as::<_, T>(&sql).bind(id), fetch_optional)?)
    }

    async fn live_by_column<T>(&self, table: Table, column: &str, value: i64) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        // Table and column names never come from request input
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 AND NOT deleted ORDER BY id",
            table.name(),
            column
        );
        Ok(run!(self, sqlx::query_as::<_, T>(&sql).bind(value), fetch_all)?)
    }

    fn ensure_updated(result: sqlx::postgres::PgQueryResult, table: Table, id: i64) -> Result<(), DatabaseError> {
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("{} {}", table.name(), id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        run!(self, sqlx::query("SELECT 1"), execute)?;
        Ok(())
    }

    async fn company(&self, id: i64) -> Result<Option<Company>, DatabaseError> {
        let query = sqlx::query_as::<_, Company>("SELECT id, name, domain FROM company WHERE id = $1")
            .bind(id);
        Ok(run!(self, query, fetch_optional)?)
    }

    async fn user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let query = sqlx::query_as::<_, User>(
            "SELECT id, company_id, name, email, access_level, deleted FROM users WHERE id = $1",
        )
        .bind(id);
        Ok(run!(self, query, fetch_optional)?)
    }

    async fn plan_risk(&self, id: i64) -> Result<Option<PlanRisk>, DatabaseError> {
        self.find_by_id(Table::PlanRisk, id).await
    }

    async fn plan_risks_by_company(&self, company_id: i64) -> Result<Vec<PlanRisk>, DatabaseError> {
        self.live_by_column(Table::PlanRisk, "company_id", company_id).await
    }

    async fn insert_plan_risk(&self, plan: &PlanRisk) -> Result<PlanRisk, DatabaseError> {
        let query = sqlx::query_as::<_, PlanRisk>(
            "INSERT INTO plan_risk (company_id, name, description, deleted)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(plan.company_id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn update_plan_risk(&self, plan: &PlanRisk) -> Result<(), DatabaseError> {
        let query = sqlx::query("UPDATE plan_risk SET name = $2, description = $3, deleted = $4 WHERE id = $1")
            .bind(plan.id)
            .bind(&plan.name)
            .bind(&plan.description)
            .bind(plan.deleted);
        let result = run!(self, query, execute)?;
        Self::ensure_updated(result, Table::PlanRisk, plan.id)
    }

    async fn unit(&self, id: i64) -> Result<Option<Unit>, DatabaseError> {
        self.find_by_id(Table::Unit, id).await
    }

    async fn units_by_plan(&self, plan_risk_id: i64) -> Result<Vec<Unit>, DatabaseError> {
        self.live_by_column(Table::Unit, "plan_risk_id", plan_risk_id).await
    }

    async fn subunits(&self, parent_id: i64) -> Result<Vec<Unit>, DatabaseError> {
        self.live_by_column(Table::Unit, "parent_id", parent_id).await
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<Unit, DatabaseError> {
        let query = sqlx::query_as::<_, Unit>(
            "INSERT INTO unit (plan_risk_id, parent_id, user_id, name, abbreviation, description, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(unit.plan_risk_id)
        .bind(unit.parent_id)
        .bind(unit.user_id)
        .bind(&unit.name)
        .bind(&unit.abbreviation)
        .bind(&unit.description)
        .bind(unit.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), DatabaseError> {
        let query = sqlx::query(
            "UPDATE unit
             SET plan_risk_id = $2, parent_id = $3, user_id = $4, name = $5,
                 abbreviation = $6, description = $7, deleted = $8
             WHERE id = $1",
        )
        .bind(unit.id)
        .bind(unit.plan_risk_id)
        .bind(unit.parent_id)
        .bind(unit.user_id)
        .bind(&unit.name)
        .bind(&unit.abbreviation)
        .bind(&unit.description)
        .bind(unit.deleted);
        let result = run!(self, query, execute)?;
        Self::ensure_updated(result, Table::Unit, unit.id)
    }

    async fn process(&self, id: i64) -> Result<Option<Process>, DatabaseError> {
        self.find_by_id(Table::Process, id).await
    }

    async fn processes_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError> {
        let query = sqlx::query_as::<_, Process>(
            "SELECT DISTINCT p.*
             FROM process p
             JOIN process_unit pu ON pu.process_id = p.id
             WHERE pu.unit_id = $1 AND NOT pu.deleted AND NOT p.deleted
             ORDER BY p.id",
        )
        .bind(unit_id);
        Ok(run!(self, query, fetch_all)?)
    }

    async fn processes_owned_by_unit(&self, unit_id: i64) -> Result<Vec<Process>, DatabaseError> {
        self.live_by_column(Table::Process, "unit_id", unit_id).await
    }

    async fn process_links_by_unit(&self, unit_id: i64) -> Result<Vec<ProcessUnit>, DatabaseError> {
        self.live_by_column(Table::ProcessUnit, "unit_id", unit_id).await
    }

    async fn insert_process(&self, process: &Process) -> Result<Process, DatabaseError> {
        let query = sqlx::query_as::<_, Process>(
            "INSERT INTO process (company_id, unit_id, name, objective, deleted)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(process.company_id)
        .bind(process.unit_id)
        .bind(&process.name)
        .bind(&process.objective)
        .bind(process.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn insert_process_unit(&self, link: &ProcessUnit) -> Result<ProcessUnit, DatabaseError> {
        let query = sqlx::query_as::<_, ProcessUnit>(
            "INSERT INTO process_unit (process_id, unit_id, deleted) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(link.process_id)
        .bind(link.unit_id)
        .bind(link.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn risk(&self, id: i64) -> Result<Option<Risk>, DatabaseError> {
        self.find_by_id(Table::Risk, id).await
    }

    async fn risks_by_unit(&self, unit_id: i64) -> Result<Vec<Risk>, DatabaseError> {
        self.live_by_column(Table::Risk, "unit_id", unit_id).await
    }

    async fn insert_risk(&self, risk: &Risk) -> Result<Risk, DatabaseError> {
        let query = sqlx::query_as::<_, Risk>(
            "INSERT INTO risk (unit_id, user_id, code, name, probability, impact, periodicity,
                               tipology, risk_type, begin, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING *",
        )
        .bind(risk.unit_id)
        .bind(risk.user_id)
        .bind(&risk.code)
        .bind(&risk.name)
        .bind(&risk.probability)
        .bind(&risk.impact)
        .bind(&risk.periodicity)
        .bind(&risk.tipology)
        .bind(&risk.risk_type)
        .bind(risk.begin)
        .bind(risk.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn update_risk(&self, risk: &Risk) -> Result<(), DatabaseError> {
        let query = sqlx::query(
            "UPDATE risk
             SET unit_id = $2, user_id = $3, code = $4, name = $5, probability = $6, impact = $7,
                 periodicity = $8, tipology = $9, risk_type = $10, begin = $11, deleted = $12
             WHERE id = $1",
        )
        .bind(risk.id)
        .bind(risk.unit_id)
        .bind(risk.user_id)
        .bind(&risk.code)
        .bind(&risk.name)
        .bind(&risk.probability)
        .bind(&risk.impact)
        .bind(&risk.periodicity)
        .bind(&risk.tipology)
        .bind(&risk.risk_type)
        .bind(risk.begin)
        .bind(risk.deleted);
        let result = run!(self, query, execute)?;
        Self::ensure_updated(result, Table::Risk, risk.id)
    }

    async fn preventive_actions(&self, risk_id: i64) -> Result<Vec<PreventiveAction>, DatabaseError> {
        self.live_by_column(Table::PreventiveAction, "risk_id", risk_id).await
    }

    async fn insert_preventive_action(&self, item: &PreventiveAction) -> Result<PreventiveAction, DatabaseError> {
        let query = sqlx::query_as::<_, PreventiveAction>(
            "INSERT INTO preventive_action (risk_id, user_id, action, accomplished, validity_begin, validity_end, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.user_id)
        .bind(&item.action)
        .bind(item.accomplished)
        .bind(item.validity_begin)
        .bind(item.validity_end)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn monitors(&self, risk_id: i64) -> Result<Vec<Monitor>, DatabaseError> {
        self.live_by_column(Table::Monitor, "risk_id", risk_id).await
    }

    async fn insert_monitor(&self, item: &Monitor) -> Result<Monitor, DatabaseError> {
        let query = sqlx::query_as::<_, Monitor>(
            "INSERT INTO monitor (risk_id, user_id, report, probability, impact, begin, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.user_id)
        .bind(&item.report)
        .bind(&item.probability)
        .bind(&item.impact)
        .bind(item.begin)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn incidents(&self, risk_id: i64) -> Result<Vec<Incident>, DatabaseError> {
        self.live_by_column(Table::Incident, "risk_id", risk_id).await
    }

    async fn insert_incident(&self, item: &Incident) -> Result<Incident, DatabaseError> {
        let query = sqlx::query_as::<_, Incident>(
            "INSERT INTO incident (risk_id, user_id, incident_type, description, action, begin, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.user_id)
        .bind(&item.incident_type)
        .bind(&item.description)
        .bind(&item.action)
        .bind(item.begin)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn contingencies(&self, risk_id: i64) -> Result<Vec<Contingency>, DatabaseError> {
        self.live_by_column(Table::Contingency, "risk_id", risk_id).await
    }

    async fn insert_contingency(&self, item: &Contingency) -> Result<Contingency, DatabaseError> {
        let query = sqlx::query_as::<_, Contingency>(
            "INSERT INTO contingency (risk_id, user_id, action, deleted) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.user_id)
        .bind(&item.action)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn risk_strategies(&self, risk_id: i64) -> Result<Vec<RiskStrategy>, DatabaseError> {
        self.live_by_column(Table::RiskStrategy, "risk_id", risk_id).await
    }

    async fn insert_risk_strategy(&self, item: &RiskStrategy) -> Result<RiskStrategy, DatabaseError> {
        let query = sqlx::query_as::<_, RiskStrategy>(
            "INSERT INTO risk_strategy (risk_id, structure_id, name, link_fpdi, deleted)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.structure_id)
        .bind(&item.name)
        .bind(&item.link_fpdi)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn risk_activities(&self, risk_id: i64) -> Result<Vec<RiskActivity>, DatabaseError> {
        self.live_by_column(Table::RiskActivity, "risk_id", risk_id).await
    }

    async fn insert_risk_activity(&self, item: &RiskActivity) -> Result<RiskActivity, DatabaseError> {
        let query = sqlx::query_as::<_, RiskActivity>(
            "INSERT INTO risk_activity (risk_id, process_id, name, link_fpdi, deleted)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.process_id)
        .bind(&item.name)
        .bind(&item.link_fpdi)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn risk_processes(&self, risk_id: i64) -> Result<Vec<RiskProcess>, DatabaseError> {
        self.live_by_column(Table::RiskProcess, "risk_id", risk_id).await
    }

    async fn insert_risk_process(&self, item: &RiskProcess) -> Result<RiskProcess, DatabaseError> {
        let query = sqlx::query_as::<_, RiskProcess>(
            "INSERT INTO risk_process (risk_id, process_id, name, link_fpdi, deleted)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(item.risk_id)
        .bind(item.process_id)
        .bind(&item.name)
        .bind(&item.link_fpdi)
        .bind(item.deleted);
        Ok(run!(self, query, fetch_one)?)
    }

    async fn risk_child_owner(&self, table: Table, id: i64) -> Result<Option<i64>, DatabaseError> {
        if !table.is_risk_child() {
            return Err(DatabaseError::QueryError(format!(
                "{} is not a risk child table",
                table.name()
            )));
        }
        let sql = format!("SELECT risk_id FROM {} WHERE id = $1 AND NOT deleted", table.name());
        let owner: Option<(i64,)> = run!(self, sqlx::query_as(&sql).bind(id), fetch_optional)?;
        Ok(owner.map(|(risk_id,)| risk_id))
    }

    async fn soft_delete(&self, table: Table, id: i64) -> Result<bool, DatabaseError> {
        let sql = format!("UPDATE {} SET deleted = TRUE WHERE id = $1 AND NOT deleted", table.name());
        let result = run!(self, sqlx::query(&sql).bind(id), execute)?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let tx = match &self.conn {
            Conn::Pool(pool) => pool.begin().await?,
            Conn::Tx(_) => return Err(DatabaseError::QueryError("transaction already open".to_string())),
        };
        Ok(Box::new(PgTransaction {
            staging: PgStore { conn: Conn::Tx(Mutex::new(tx)) },
        }))
    }
}
