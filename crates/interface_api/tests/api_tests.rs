//! HTTP API tests over the in-memory ledger store

use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::{Actor, ActorRole, TenantId};
use domain_ledger::InMemoryLedgerStore;
use interface_api::auth::create_token;
use interface_api::config::{ApiConfig, StorageBackend};
use interface_api::{create_router, AppState};
use test_utils::TenantFixtures;

const SECRET: &str = "test-secret";

fn server() -> TestServer {
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        storage: StorageBackend::Memory,
        ..ApiConfig::default()
    };
    let state = AppState::new(Arc::new(InMemoryLedgerStore::new()), config);
    TestServer::new(create_router(state)).unwrap()
}

fn token_for(actor: &Actor) -> String {
    create_token(actor, SECRET, 300).unwrap()
}

fn acme() -> String {
    token_for(&TenantFixtures::acme_employee())
}

fn globex() -> String {
    token_for(&Actor::new(TenantId::new("GLOBEX").unwrap(), "globex-admin", ActorRole::Admin))
}

fn amount(body: &Value, pointer: &str) -> Decimal {
    let raw = body
        .pointer(pointer)
        .unwrap_or_else(|| panic!("missing {} in {}", pointer, body));
    match raw {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

async fn create_account(server: &TestServer, token: &str, kind: &str, name: &str) -> String {
    let response = server
        .post("/api/v1/accounts")
        .authorization_bearer(token)
        .json(&json!({"kind": kind, "name": name}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

async fn status_and_body(response: axum_test::TestResponse) -> (StatusCode, Value) {
    let status = response.status_code();
    (status, response.json::<Value>())
}

#[tokio::test]
async fn test_health_is_public() {
    let server = server();
    server.get("/health").await.assert_status_ok();

    let ready = server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let server = server();
    let (status, body) = status_and_body(server.get("/api/v1/accounts").await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_tampered_token_is_unauthorized() {
    let server = server();
    let forged = create_token(&TenantFixtures::acme_admin(), "someone-else", 300).unwrap();
    let response = server
        .get("/api/v1/accounts")
        .authorization_bearer(forged)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_lifecycle() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    let fetched = server
        .get(&format!("/api/v1/accounts/{}", id))
        .authorization_bearer(&token)
        .await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["name"], "Ravi Traders");

    let updated = server
        .put(&format!("/api/v1/accounts/{}", id))
        .authorization_bearer(&token)
        .json(&json!({"region": "North"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["region"], "North");

    let listed = server
        .get("/api/v1/accounts?kind=customer&name=ravi")
        .authorization_bearer(&token)
        .await;
    assert_eq!(listed.json::<Vec<Value>>().len(), 1);

    server
        .delete(&format!("/api/v1/accounts/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get(&format!("/api/v1/accounts/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_balance_cannot_be_edited() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "supplier", "Metro Wholesale").await;

    let (status, body) = status_and_body(
        server
            .put(&format!("/api/v1/accounts/{}", id))
            .authorization_bearer(&token)
            .json(&json!({"current_balance": "1000000"}))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_blank_name_is_validation_error() {
    let server = server();
    let (status, body) = status_and_body(
        server
            .post("/api/v1/accounts")
            .authorization_bearer(acme())
            .json(&json!({"kind": "customer", "name": ""}))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_malformed_account_id_is_validation_error() {
    let server = server();
    let response = server
        .get("/api/v1/accounts/not-an-id")
        .authorization_bearer(acme())
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_other_tenant_is_forbidden() {
    let server = server();
    let id = create_account(&server, &acme(), "customer", "Ravi Traders").await;

    let (status, body) = status_and_body(
        server
            .get(&format!("/api/v1/accounts/{}", id))
            .authorization_bearer(globex())
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(globex())
        .json(&json!({"total_amount": 10}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sale_lines_are_summed_and_deposit_hits_cash() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    let response = server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(&token)
        .json(&json!({
            "lines": [
                {"item_id": "SKU-1", "quantity": 2, "unit_price": "250", "total_price": "500", "paid_amount": "300"},
                {"item_id": "SKU-2", "quantity": 1, "unit_price": 500, "total_price": 500},
            ]
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body = response.json::<Value>();
    assert_eq!(amount(&body, "/transaction/total_amount"), dec!(1000));
    assert_eq!(amount(&body, "/transaction/remaining_amount"), dec!(700));
    assert_eq!(amount(&body, "/account/current_balance"), dec!(1000));
    assert_eq!(body["settlement"]["account"]["name"], "cashInHand");
    assert_eq!(amount(&body, "/settlement/account/current_balance"), dec!(300));

    let serial = body["transaction"]["serial"].as_str().unwrap();
    assert!(serial.starts_with("SAL-"));

    let fetched = server
        .get(&format!("/api/v1/transactions/{}", serial))
        .authorization_bearer(&token)
        .await;
    fetched.assert_status_ok();
}

#[tokio::test]
async fn test_conflicting_lines_and_totals_rejected() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(&token)
        .json(&json!({"total_amount": 900, "lines": [{"total_price": 1000}]}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_out_of_range_sale_is_validation_error() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;
    let half = (Decimal::MAX / Decimal::TWO + Decimal::ONE_THOUSAND).to_string();

    for body in [
        json!({"total_amount": half}),
        json!({"lines": [{"total_price": half}, {"total_price": half}]}),
    ] {
        let response = server
            .post(&format!("/api/v1/accounts/{}/sales", id))
            .authorization_bearer(&token)
            .json(&body)
            .await;
        let (status, _) = status_and_body(response).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    let account = server
        .get(&format!("/api/v1/accounts/{}", id))
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    assert_eq!(amount(&account, "/current_balance"), Decimal::ZERO);
}

#[tokio::test]
async fn test_payment_allocations_are_readable() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(&token)
        .json(&json!({"total_amount": "400"}))
        .await
        .assert_status(StatusCode::CREATED);

    let payment = server
        .post(&format!("/api/v1/accounts/{}/payments", id))
        .authorization_bearer(&token)
        .json(&json!({"amount": 150}))
        .await;
    payment.assert_status(StatusCode::CREATED);
    let body = payment.json::<Value>();
    assert_eq!(amount(&body, "/account/current_balance"), dec!(250));
    assert_eq!(amount(&body, "/allocations/0/remaining_after"), dec!(250));

    let serial = body["transaction"]["serial"].as_str().unwrap();
    let allocations = server
        .get(&format!("/api/v1/transactions/{}/allocations", serial))
        .authorization_bearer(&token)
        .await;
    allocations.assert_status_ok();
    assert_eq!(allocations.json::<Vec<Value>>().len(), 1);

    let log = server
        .get(&format!("/api/v1/accounts/{}/transactions?limit=10", id))
        .authorization_bearer(&token)
        .await;
    assert_eq!(log.json::<Vec<Value>>().len(), 2);

    let report = server
        .get(&format!("/api/v1/accounts/{}/reconcile", id))
        .authorization_bearer(&token)
        .await;
    report.assert_status_ok();
    assert_eq!(report.json::<Value>()["ok"], true);
}

#[tokio::test]
async fn test_overpayment_reports_unallocated() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(&token)
        .json(&json!({"total_amount": 100}))
        .await
        .assert_status(StatusCode::CREATED);

    let (status, body) = status_and_body(
        server
            .post(&format!("/api/v1/accounts/{}/payments", id))
            .authorization_bearer(&token)
            .json(&json!({"amount": "130"}))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "overpayment");
    assert_eq!(amount(&body, "/details/unallocated"), dec!(30));
}

#[tokio::test]
async fn test_over_return_rejected() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "supplier", "Metro Wholesale").await;

    let purchase = server
        .post(&format!("/api/v1/accounts/{}/purchases", id))
        .authorization_bearer(&token)
        .json(&json!({"total_amount": 80}))
        .await;
    purchase.assert_status(StatusCode::CREATED);
    let serial = purchase.json::<Value>()["transaction"]["serial"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = status_and_body(
        server
            .post(&format!("/api/v1/accounts/{}/returns", id))
            .authorization_bearer(&token)
            .json(&json!({"amount": 81, "original_serial": serial}))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "over_return");
    assert_eq!(amount(&body, "/details/available"), dec!(80));
}

#[tokio::test]
async fn test_delete_with_history_is_conflict() {
    let server = server();
    let token = acme();
    let id = create_account(&server, &token, "customer", "Ravi Traders").await;

    server
        .post(&format!("/api/v1/accounts/{}/sales", id))
        .authorization_bearer(&token)
        .json(&json!({"total_amount": 50, "deposited_amount": 50}))
        .await
        .assert_status(StatusCode::CREATED);

    let (status, body) = status_and_body(
        server
            .delete(&format!("/api/v1/accounts/{}", id))
            .authorization_bearer(&token)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_cash_in_hand_is_idempotent() {
    let server = server();
    let token = acme();

    let first = server
        .post("/api/v1/accounts/cash-in-hand")
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    let second = server
        .post("/api/v1/accounts/cash-in-hand")
        .authorization_bearer(&token)
        .await
        .json::<Value>();

    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["kind"], "cash");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let server = server();
    let response = server.get("/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}
