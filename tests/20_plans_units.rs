mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, ADMIN, COLABORATOR, MANAGER, OUTSIDER};
use forrisco_api::auth::Permission;
use forrisco_api::config::AppConfig;

#[tokio::test]
async fn plan_lifecycle_and_unit_guard() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.token(ADMIN);
    let plan_id = app.create_plan("Plano 2024").await?;

    let res = app
        .put("/api/plan-risk", &admin, json!({ "id": plan_id, "name": "Plano 2024/2025", "description": "Revisado" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["description"], "Revisado");

    app.create_unit(plan_id, "Reitoria", None).await?;
    let res = app.delete(&format!("/api/plan-risk/{}", plan_id), &admin).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "O plano possui unidades, portanto não pode ser excluído.");

    let empty = app.create_plan("Plano vazio").await?;
    let res = app.delete(&format!("/api/plan-risk/{}", empty), &admin).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.get(&format!("/api/plan-risk/{}", empty), &admin).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn units_require_a_plan_of_the_company() -> Result<()> {
    let app = TestApp::spawn().await;
    let plan_id = app.create_plan("Plano 2024").await?;

    let body = json!({ "name": "Reitoria", "abbreviation": "REI", "userId": ADMIN });
    let res = app.post("/api/unit/new", &app.token(ADMIN), body).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Unidade não possui Plano de Risco");

    // Another company's admin cannot see the plan
    let body = json!({ "name": "Reitoria", "abbreviation": "REI", "userId": OUTSIDER, "planRiskId": plan_id });
    let res = app.post("/api/unit/new", &app.token(OUTSIDER), body).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Unidade não possui Plano de Risco");

    let res = app.get(&format!("/api/unit?planId={}", plan_id), &app.token(OUTSIDER)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "O Plano de Risco não foi encontrado");
    Ok(())
}

#[tokio::test]
async fn subunits_and_listings() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = app.token(COLABORATOR);
    let plan_id = app.create_plan("Plano 2024").await?;
    let rectory = app.create_unit(plan_id, "Reitoria", None).await?;
    let finance = app.create_unit(plan_id, "Finanças", None).await?;
    let cabinet = app.create_unit(plan_id, "Gabinete", Some(rectory)).await?;

    let res = app.get(&format!("/api/unit?planId={}", plan_id), &token).await;
    assert_eq!(res.data()["total"], 2);

    let res = app.get(&format!("/api/unit/listsub/{}", rectory), &token).await;
    assert_eq!(res.data()["list"][0]["id"], cabinet);

    let res = app.get("/api/unit/listsub/987654", &token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "A unidade não foi encontrada");

    let res = app.get(&format!("/api/unit/listsub?planId={}", plan_id), &token).await;
    assert_eq!(res.data()["total"], 1);

    let res = app.get(&format!("/api/unit/allByPlan?planId={}", plan_id), &token).await;
    assert_eq!(res.data()["total"], 3);

    let res = app.get(&format!("/api/unit/{}", finance), &token).await;
    assert_eq!(res.data()["abbreviation"], "Fin");

    let res = app.get("/api/unit?planId=", &token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/api/unit/999999", &token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "A unidade solicitada não foi encontrado.");
    Ok(())
}

#[tokio::test]
async fn subunit_needs_parent() -> Result<()> {
    let app = TestApp::spawn().await;
    let plan_id = app.create_plan("Plano 2024").await?;
    let res = app
        .post(
            "/api/unit/subnew",
            &app.token(ADMIN),
            json!({ "name": "Gabinete", "abbreviation": "GAB", "userId": ADMIN, "planRiskId": plan_id }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Unidade não possui unidade pai");
    Ok(())
}

#[tokio::test]
async fn unit_with_subunits_cannot_be_deleted() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.token(ADMIN);
    let plan_id = app.create_plan("Plano 2024").await?;
    let rectory = app.create_unit(plan_id, "Reitoria", None).await?;
    let cabinet = app.create_unit(plan_id, "Gabinete", Some(rectory)).await?;

    let res = app.delete(&format!("/api/unit/{}", rectory), &admin).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "A unidade possuiu riscos ou subunidades, portanto não pode ser excluida.");

    let res = app.delete(&format!("/api/unit/{}", cabinet), &admin).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["deleted"], true);

    let res = app.delete(&format!("/api/unit/{}", cabinet), &admin).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.delete(&format!("/api/unit/{}", rectory), &admin).await;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn update_is_open_to_managers_and_editors() -> Result<()> {
    let app = TestApp::spawn().await;
    let plan_id = app.create_plan("Plano 2024").await?;
    let unit = app.create_unit(plan_id, "Reitoria", None).await?;
    let body = json!({ "id": unit, "name": "Reitoria Geral", "abbreviation": "RG", "userId": MANAGER });

    let res = app.put("/api/unit", &app.token(COLABORATOR), body.clone()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let editor = app.token_with(COLABORATOR, vec![Permission::EditUnit]);
    let res = app.put("/api/unit", &editor, body.clone()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["userId"], MANAGER);

    let res = app
        .put("/api/unit", &app.token(MANAGER), json!({ "id": unit, "name": "X", "abbreviation": "X", "userId": OUTSIDER }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "O usuário responsável não foi encontrado.");
    Ok(())
}

#[tokio::test]
async fn search_filters_orders_and_pages() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = app.token(COLABORATOR);
    let plan_id = app.create_plan("Plano 2024").await?;
    let audit = app.create_unit(plan_id, "Auditoria", None).await?;
    let _finance = app.create_unit(plan_id, "Finanças", None).await?;
    let admin_unit = app.create_unit(plan_id, "Administração", None).await?;
    let sub = app.create_unit(plan_id, "Arquivo", Some(admin_unit)).await?;

    let res = app
        .get(&format!("/api/unit/search?planRiskId={}&terms=a&ordResult=2&limit=2&page=1", plan_id), &token)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 4);
    let names: Vec<String> = res.data()["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Finanças", "Auditoria"]);

    let res = app
        .get(
            &format!(
                "/api/unit/searchByKey?planRiskId={}&itensSelect={}&subitensSelect={}&ordResult=1",
                plan_id, audit, sub
            ),
            &token,
        )
        .await;
    assert_eq!(res.data()["total"], 2);
    assert_eq!(res.data()["list"][0]["name"], "Arquivo");

    let res = app.get("/api/unit/search?planRiskId=424242", &token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "plano não foi encontrado");
    Ok(())
}

#[tokio::test]
async fn search_by_key_without_selection_searches_every_unit() -> Result<()> {
    let app = TestApp::spawn().await;
    let token = app.token(COLABORATOR);
    let plan_id = app.create_plan("Plano 2024").await?;
    let rectory = app.create_unit(plan_id, "Reitoria", None).await?;
    app.create_unit(plan_id, "Finanças", None).await?;

    let res = app
        .get(&format!("/api/unit/searchByKey?planRiskId={}&terms=rei", plan_id), &token)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["list"][0]["id"], rectory);
    Ok(())
}

#[tokio::test]
async fn search_without_limit_returns_every_match_in_production() -> Result<()> {
    let mut config = AppConfig::production();
    config.security.jwt_secret = "production-test-secret".to_string();
    let app = TestApp::spawn_with(config).await;
    let plan_id = app.create_plan("Plano 2024").await?;
    for i in 0..60 {
        app.create_unit(plan_id, &format!("Unidade {:02}", i), None).await?;
    }

    let res = app
        .get(&format!("/api/unit/search?planRiskId={}", plan_id), &app.token(COLABORATOR))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["total"], 60);
    assert_eq!(res.data()["list"].as_array().map(Vec::len), Some(60));
    Ok(())
}

#[tokio::test]
async fn duplicate_copies_units_and_risks() -> Result<()> {
    let app = TestApp::spawn().await;
    let admin = app.token(ADMIN);
    let source = app.create_plan("Plano 2023").await?;
    let target = app.create_plan("Plano 2024").await?;
    let rectory = app.create_unit(source, "Reitoria", None).await?;
    app.create_unit(source, "Gabinete", Some(rectory)).await?;
    app.create_risk(rectory, "R01").await?;

    let res = app
        .post("/api/unit/duplicate", &admin, json!({ "unitIds": [rectory, 777777], "planRiskId": target }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data(), json!({ "units": 2, "risks": 1 }));

    let res = app.get(&format!("/api/unit/allByPlan?planId={}", target), &admin).await;
    assert_eq!(res.data()["total"], 2);

    let res = app
        .post("/api/unit/duplicate", &admin, json!({ "unitIds": [rectory], "planRiskId": 888888 }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "Plano de Risco não encontrado");
    Ok(())
}
