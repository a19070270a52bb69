#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use forrisco_api::auth::{generate_jwt, AccessLevel, Claims, Permission};
use forrisco_api::config::AppConfig;
use forrisco_api::database::models::{Company, User};
use forrisco_api::database::MemoryStore;
use forrisco_api::{app, AppState};

pub const COMPANY: i64 = 1;
pub const OTHER_COMPANY: i64 = 2;
pub const ADMIN: i64 = 10;
pub const MANAGER: i64 = 11;
pub const COLABORATOR: i64 = 12;
pub const OUTSIDER: i64 = 20;

/// Router over a fresh in-memory store with two companies and a few users
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// Parsed body, `Null` for non-JSON bodies
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap_or_default().to_string()
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(AppConfig::development()).await
    }

    /// Same seed data under another configuration profile
    pub async fn spawn_with(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        for (id, name) in [(COMPANY, "Universidade"), (OTHER_COMPANY, "Prefeitura")] {
            store
                .seed_company(Company {
                    id,
                    name: name.into(),
                    domain: format!("{}.localhost", name.to_lowercase()),
                })
                .await;
        }
        for (id, company_id, level) in [
            (ADMIN, COMPANY, AccessLevel::CompanyAdmin),
            (MANAGER, COMPANY, AccessLevel::Manager),
            (COLABORATOR, COMPANY, AccessLevel::Colaborator),
            (OUTSIDER, OTHER_COMPANY, AccessLevel::CompanyAdmin),
        ] {
            store
                .seed_user(User {
                    id,
                    company_id,
                    name: format!("Usuário {}", id),
                    email: format!("user{}@example.com", id),
                    access_level: level.value(),
                    deleted: false,
                })
                .await;
        }

        let router = app(AppState::new(store.clone(), config.clone()));
        Self { router, store, config }
    }

    pub fn token(&self, user_id: i64) -> String {
        self.token_with(user_id, Vec::new())
    }

    pub fn token_with(&self, user_id: i64, permissions: Vec<Permission>) -> String {
        let (company_id, level) = match user_id {
            ADMIN => (COMPANY, AccessLevel::CompanyAdmin),
            MANAGER => (COMPANY, AccessLevel::Manager),
            COLABORATOR => (COMPANY, AccessLevel::Colaborator),
            _ => (OTHER_COMPANY, AccessLevel::CompanyAdmin),
        };
        let user = User {
            id: user_id,
            company_id,
            name: String::new(),
            email: format!("user{}@example.com", user_id),
            access_level: level.value(),
            deleted: false,
        };
        let claims = Claims::new(&user, permissions, 1);
        generate_jwt(&claims, &self.config.security.jwt_secret).expect("token")
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).expect("json body"))
            }
            None => Body::empty(),
        };
        self.dispatch(builder.body(body).expect("request")).await
    }

    pub async fn send_bytes(&self, method: Method, uri: &str, token: &str, bytes: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(bytes))
            .expect("request");
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("infallible router");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body").to_vec();
        TestResponse { status, headers, bytes }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a plan as the company admin and returns its id
    pub async fn create_plan(&self, name: &str) -> Result<i64> {
        let res = self
            .post("/api/plan-risk/new", &self.token(ADMIN), serde_json::json!({ "name": name }))
            .await;
        anyhow::ensure!(res.status == StatusCode::CREATED, "plan creation failed: {:?}", res.json());
        res.data()["id"].as_i64().ok_or_else(|| anyhow::anyhow!("plan id missing"))
    }

    pub async fn create_unit(&self, plan_id: i64, name: &str, parent_id: Option<i64>) -> Result<i64> {
        let (uri, body) = match parent_id {
            Some(parent) => (
                "/api/unit/subnew",
                serde_json::json!({
                    "name": name,
                    "abbreviation": &name[..3],
                    "userId": ADMIN,
                    "planRiskId": plan_id,
                    "parentId": parent
                }),
            ),
            None => (
                "/api/unit/new",
                serde_json::json!({
                    "name": name,
                    "abbreviation": &name[..3],
                    "userId": ADMIN,
                    "planRiskId": plan_id
                }),
            ),
        };
        let res = self.post(uri, &self.token(ADMIN), body).await;
        anyhow::ensure!(res.status == StatusCode::CREATED, "unit creation failed: {:?}", res.json());
        res.data()["id"].as_i64().ok_or_else(|| anyhow::anyhow!("unit id missing"))
    }

    pub async fn create_risk(&self, unit_id: i64, code: &str) -> Result<i64> {
        let res = self
            .post(
                "/api/risk/new",
                &self.token(ADMIN),
                serde_json::json!({
                    "unitId": unit_id,
                    "userId": ADMIN,
                    "code": code,
                    "name": format!("Risco {}", code),
                    "probability": "Média",
                    "impact": "Alto",
                    "periodicity": "Mensal",
                    "tipology": "Operacional",
                    "riskType": "Ameaça"
                }),
            )
            .await;
        anyhow::ensure!(res.status == StatusCode::CREATED, "risk creation failed: {:?}", res.json());
        res.data()["id"].as_i64().ok_or_else(|| anyhow::anyhow!("risk id missing"))
    }
}
