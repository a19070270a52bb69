use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::Store;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{BackupService, PlanService, ProcessService, RiskService, UnitService};

/// Shared by every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn plans(&self) -> PlanService {
        PlanService::new(self.store.clone())
    }

    pub fn units(&self) -> UnitService {
        UnitService::new(self.store.clone())
    }

    pub fn risks(&self) -> RiskService {
        RiskService::new(self.store.clone())
    }

    pub fn processes(&self) -> ProcessService {
        ProcessService::new(self.store.clone())
    }

    pub fn backups(&self) -> BackupService {
        BackupService::new(self.store.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(plan_routes())
        .merge(unit_routes())
        .merge(risk_routes())
        .merge(process_routes())
        .merge(company_routes(state.config.api.restore_upload_limit_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut router = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        router = router.layer(cors_layer(&state.config.security.cors_origins));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

fn plan_routes() -> Router<AppState> {
    use protected::plan;

    Router::new()
        .route("/api/plan-risk", get(plan::list).put(plan::update))
        .route("/api/plan-risk/new", post(plan::create))
        .route("/api/plan-risk/:id", get(plan::get).delete(plan::delete))
}

fn unit_routes() -> Router<AppState> {
    use protected::unit;

    Router::new()
        .route("/api/unit", get(unit::list_units).put(unit::update_unit))
        .route("/api/unit/new", post(unit::save))
        .route("/api/unit/subnew", post(unit::save_sub))
        .route("/api/unit/duplicate", post(unit::duplicate))
        .route("/api/unit/listsub", get(unit::list_subunits_by_plan))
        .route("/api/unit/listsub/:unit_id", get(unit::list_subunits))
        .route("/api/unit/allByPlan", get(unit::list_all_units_by_plan))
        .route("/api/unit/searchByKey", get(unit::search_by_key))
        .route("/api/unit/search", get(unit::search))
        .route("/api/unit/:id", get(unit::get_unit).delete(unit::delete_unit))
}

fn risk_routes() -> Router<AppState> {
    use protected::risk;

    Router::new()
        .route("/api/risk", get(risk::list).put(risk::update))
        .route("/api/risk/new", post(risk::create))
        .route("/api/risk/:id", get(risk::get).delete(risk::delete))
        .route("/api/risk/:id/:collection", get(risk::list_items).post(risk::add_item))
        .route("/api/risk/:id/:collection/:item", delete(risk::remove_item))
}

fn process_routes() -> Router<AppState> {
    use protected::process;

    Router::new()
        .route("/api/process", get(process::list))
        .route("/api/process/new", post(process::create))
        .route("/api/process/:id", delete(process::delete))
}

fn company_routes(restore_limit: usize) -> Router<AppState> {
    use protected::company;

    Router::new()
        .route("/company/export", get(company::export))
        .route(
            "/company/restore",
            post(company::restore).layer(DefaultBodyLimit::max(restore_limit)),
        )
}
