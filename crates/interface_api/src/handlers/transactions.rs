//! Transaction log and reconciliation handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use core_kernel::Actor;
use domain_ledger::{AllocationRecord, Page, ReconciliationReport, Transaction};

use crate::dto::PageParams;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::handlers::parse_account_id;
use crate::AppState;

/// `GET /accounts/:id/transactions?limit&offset`
pub async fn list_account_transactions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let id = parse_account_id(&id)?;
    let rows = state
        .ledger
        .list_by_account(&actor.tenant, id, Page::from(params))
        .await?;
    Ok(Json(rows))
}

/// `GET /accounts/:id/reconcile`
pub async fn reconcile_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let id = parse_account_id(&id)?;
    Ok(Json(state.engine.reconcile(&actor.tenant, id).await?))
}

/// `GET /transactions/:serial`
pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(serial): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.ledger.get_by_serial(&actor.tenant, &serial).await?))
}

/// `GET /transactions/:serial/allocations`
pub async fn list_allocations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(serial): Path<String>,
) -> Result<Json<Vec<AllocationRecord>>, ApiError> {
    Ok(Json(state.ledger.list_allocations(&actor.tenant, &serial).await?))
}
