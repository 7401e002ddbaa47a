//! Account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use core_kernel::Actor;
use domain_ledger::{Account, AccountMetadataUpdate, AccountQuery, CreateAccount};

use crate::dto::{CreateAccountRequest, ListAccountsParams, UpdateAccountRequest};
use crate::error::ApiError;
use crate::extract::{ApiQuery, ValidatedJson};
use crate::handlers::parse_account_id;
use crate::AppState;

/// `POST /accounts`
pub async fn create_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ValidatedJson(request): ValidatedJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state
        .accounts
        .create_account(&actor.tenant, CreateAccount::from(request))
        .await?;

    info!(account_id = %account.id, kind = %account.kind, actor = %actor.actor_id, "Account created");
    Ok((StatusCode::CREATED, Json(account)))
}

/// `GET /accounts`
pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    ApiQuery(params): ApiQuery<ListAccountsParams>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts = state
        .accounts
        .list_accounts(&actor.tenant, AccountQuery::from(params))
        .await?;
    Ok(Json(accounts))
}

/// `GET /accounts/:id`
pub async fn get_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_account_id(&id)?;
    Ok(Json(state.accounts.get_account(&actor.tenant, id).await?))
}

/// `PUT /accounts/:id`
pub async fn update_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_account_id(&id)?;
    let account = state
        .accounts
        .update_account_metadata(&actor.tenant, id, AccountMetadataUpdate::from(request))
        .await?;
    Ok(Json(account))
}

/// `DELETE /accounts/:id`
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_account_id(&id)?;
    state.accounts.delete_account(&actor.tenant, id).await?;

    info!(account_id = %id, actor = %actor.actor_id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /accounts/cash-in-hand`
pub async fn cash_in_hand(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.accounts.get_or_create_cash_in_hand(&actor.tenant).await?))
}
