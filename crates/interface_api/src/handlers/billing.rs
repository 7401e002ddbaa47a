//! Billing event handlers
//!
//! Each handler turns the request into one canonical command and hands it to
//! the reconciliation engine.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use core_kernel::Actor;
use domain_ledger::{PaymentPosted, Posted};

use crate::dto::{InvoiceRequest, PaymentRequest, ReturnRequest};
use crate::error::ApiError;
use crate::extract::ValidatedJson;
use crate::handlers::parse_account_id;
use crate::AppState;

/// `POST /accounts/:id/sales`
pub async fn record_sale(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<Posted>), ApiError> {
    let cmd = request.into_sale(parse_account_id(&id)?)?;
    let posted = state.engine.record_sale(&actor.tenant, cmd).await?;

    info!(serial = %posted.transaction.serial, actor = %actor.actor_id, "Sale recorded");
    Ok((StatusCode::CREATED, Json(posted)))
}

/// `POST /accounts/:id/purchases`
pub async fn record_purchase(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<InvoiceRequest>,
) -> Result<(StatusCode, Json<Posted>), ApiError> {
    let cmd = request.into_purchase(parse_account_id(&id)?)?;
    let posted = state.engine.record_purchase(&actor.tenant, cmd).await?;

    info!(serial = %posted.transaction.serial, actor = %actor.actor_id, "Purchase recorded");
    Ok((StatusCode::CREATED, Json(posted)))
}

/// `POST /accounts/:id/payments`
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<PaymentRequest>,
) -> Result<(StatusCode, Json<PaymentPosted>), ApiError> {
    let cmd = request.into_command(parse_account_id(&id)?);
    let posted = state.engine.record_payment(&actor.tenant, cmd).await?;

    info!(
        serial = %posted.transaction.serial,
        invoices = posted.allocations.len(),
        actor = %actor.actor_id,
        "Payment recorded"
    );
    Ok((StatusCode::CREATED, Json(posted)))
}

/// `POST /accounts/:id/returns`
pub async fn record_return(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<ReturnRequest>,
) -> Result<(StatusCode, Json<Posted>), ApiError> {
    let cmd = request.into_command(parse_account_id(&id)?);
    let posted = state.engine.record_return(&actor.tenant, cmd).await?;

    info!(serial = %posted.transaction.serial, actor = %actor.actor_id, "Return recorded");
    Ok((StatusCode::CREATED, Json(posted)))
}
