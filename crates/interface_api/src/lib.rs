//! HTTP API Layer
//!
//! REST surface of the retail ledger, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one thin function per route, delegating to the ledger services
//! - **Middleware**: authentication, audit logging, request ids, tracing
//! - **DTOs**: request shapes normalized into domain commands
//! - **Error Handling**: one JSON envelope for every failure
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(Arc::new(InMemoryLedgerStore::new()), config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod extract;
pub mod sweep;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_ledger::{AccountStore, LedgerStore, ReconciliationEngine, TransactionLedger};

use crate::config::ApiConfig;
use crate::middleware::{audit_middleware, auth_middleware};
use crate::handlers::{accounts, billing, health, transactions};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub accounts: AccountStore,
    pub ledger: TransactionLedger,
    pub engine: ReconciliationEngine,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the ledger services over one store
    pub fn new(store: Arc<dyn LedgerStore>, config: ApiConfig) -> Self {
        let ledger = TransactionLedger::new(store.clone())
            .with_max_serial_attempts(config.max_serial_attempts);
        Self {
            accounts: AccountStore::new(store.clone()),
            engine: ReconciliationEngine::with_ledger(store.clone(), ledger.clone()),
            ledger,
            store,
            config,
        }
    }
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let account_routes = Router::new()
        .route("/", post(accounts::create_account).get(accounts::list_accounts))
        .route("/cash-in-hand", post(accounts::cash_in_hand))
        .route(
            "/:id",
            get(accounts::get_account)
                .put(accounts::update_account)
                .delete(accounts::delete_account),
        )
        .route("/:id/sales", post(billing::record_sale))
        .route("/:id/purchases", post(billing::record_purchase))
        .route("/:id/payments", post(billing::record_payment))
        .route("/:id/returns", post(billing::record_return))
        .route("/:id/transactions", get(transactions::list_account_transactions))
        .route("/:id/reconcile", get(transactions::reconcile_account));

    let transaction_routes = Router::new()
        .route("/:serial", get(transactions::get_transaction))
        .route("/:serial/allocations", get(transactions::list_allocations));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/accounts", account_routes)
        .nest("/transactions", transaction_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
