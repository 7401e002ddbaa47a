//! Account store
//!
//! Tenant-scoped creation, lookup and metadata maintenance for ledger and
//! subsidiary accounts. Nothing here can change a balance.

use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{money, AccountId, TenantId};

use crate::account::{Account, AccountMetadataUpdate, AccountQuery, CreateAccount};
use crate::error::LedgerError;
use crate::ports::{LedgerStore, LedgerUnit};

/// Service over ledger (customer/supplier) and subsidiary (bank/cash) accounts
#[derive(Clone)]
pub struct AccountStore {
    store: Arc<dyn LedgerStore>,
}

impl AccountStore {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Creates an account whose running balance starts at its opening balance
    ///
    /// # Errors
    ///
    /// `Validation` when the name is blank or the opening balance is out of
    /// range. The cash-in-hand name is reserved
    /// for [`get_or_create_cash_in_hand`](Self::get_or_create_cash_in_hand).
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn create_account(
        &self,
        tenant: &TenantId,
        request: CreateAccount,
    ) -> Result<Account, LedgerError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("account name must not be empty"));
        }

        let opening_balance = money::bounded("opening_balance", request.opening_balance)?;

        let mut account = Account::new(tenant.clone(), request.kind, name, opening_balance);
        if account.is_cash_in_hand() {
            return Err(LedgerError::validation(format!(
                "'{}' is reserved for the company cash account",
                name
            )));
        }
        account.address = request.address;
        account.region = request.region;
        account.contact = request.contact;

        let mut unit = self.store.begin().await?;
        unit.insert_account(&account).await?;
        unit.commit().await?;

        info!(account_id = %account.id, tenant = %tenant, "account created");
        Ok(account)
    }

    /// Fetches an account owned by `tenant`
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Forbidden` for another tenant's account
    pub async fn get_account(&self, tenant: &TenantId, id: AccountId) -> Result<Account, LedgerError> {
        let account = self
            .store
            .find_account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Account", id))?;
        account.ensure_owned_by(tenant)?;
        Ok(account)
    }

    /// Lists a tenant's accounts, newest first
    pub async fn list_accounts(
        &self,
        tenant: &TenantId,
        query: AccountQuery,
    ) -> Result<Vec<Account>, LedgerError> {
        Ok(self.store.list_accounts(tenant, &query).await?)
    }

    /// Changes name, address, region or contact
    #[instrument(skip(self, update))]
    pub async fn update_account_metadata(
        &self,
        tenant: &TenantId,
        id: AccountId,
        update: AccountMetadataUpdate,
    ) -> Result<Account, LedgerError> {
        if let Some(ref name) = update.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("account name must not be empty"));
            }
        }

        let mut unit = self.store.begin().await?;
        let account = lock_owned(unit.as_mut(), tenant, id).await?;
        if account.is_cash_in_hand() && update.name.is_some() {
            return Err(LedgerError::validation("the company cash account cannot be renamed"));
        }

        let account = account.with_metadata(update);
        unit.save_metadata(&account).await?;
        unit.commit().await?;

        Ok(account)
    }

    /// Deletes an account that has never moved
    ///
    /// # Errors
    ///
    /// `Conflict` when the balance differs from the opening balance or any
    /// log row references the account
    #[instrument(skip(self))]
    pub async fn delete_account(&self, tenant: &TenantId, id: AccountId) -> Result<(), LedgerError> {
        let mut unit = self.store.begin().await?;
        let account = lock_owned(unit.as_mut(), tenant, id).await?;

        if !account.is_at_opening_balance() {
            return Err(LedgerError::conflict(format!(
                "account {} has balance {} but opened at {}; only unmoved accounts can be deleted",
                id, account.current_balance, account.opening_balance
            )));
        }
        let references = unit.count_transactions(id).await?;
        if references > 0 {
            return Err(LedgerError::conflict(format!(
                "account {} is referenced by {} transaction(s)",
                id, references
            )));
        }

        unit.delete_account(id).await?;
        unit.commit().await?;

        info!(account_id = %id, tenant = %tenant, "account deleted");
        Ok(())
    }

    /// Returns the tenant's cash account, creating it on first use
    pub async fn get_or_create_cash_in_hand(&self, tenant: &TenantId) -> Result<Account, LedgerError> {
        let mut unit = self.store.begin().await?;
        let account = cash_in_hand_in(unit.as_mut(), tenant).await?;
        unit.commit().await?;
        Ok(account)
    }
}

/// Locks an account inside `unit` and checks its tenant
pub(crate) async fn lock_owned(
    unit: &mut dyn LedgerUnit,
    tenant: &TenantId,
    id: AccountId,
) -> Result<Account, LedgerError> {
    let account = unit
        .lock_account(id)
        .await?
        .ok_or_else(|| LedgerError::not_found("Account", id))?;
    account.ensure_owned_by(tenant)?;
    Ok(account)
}

/// Finds or creates the cash-in-hand account inside an open unit
///
/// When a concurrent unit wins the insert, the row it created is re-read.
pub(crate) async fn cash_in_hand_in(
    unit: &mut dyn LedgerUnit,
    tenant: &TenantId,
) -> Result<Account, LedgerError> {
    if let Some(existing) = unit.find_cash_in_hand(tenant).await? {
        return Ok(existing);
    }

    let account = Account::cash_in_hand(tenant.clone());
    if unit.insert_account(&account).await? {
        info!(account_id = %account.id, tenant = %tenant, "cash in hand created");
        return Ok(account);
    }

    unit.find_cash_in_hand(tenant)
        .await?
        .ok_or_else(|| LedgerError::conflict("cash in hand account vanished during creation"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;
    use crate::ports::memory::InMemoryLedgerStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn service() -> AccountStore {
        AccountStore::new(Arc::new(InMemoryLedgerStore::new()))
    }

    fn tenant() -> TenantId {
        TenantId::new("ACME01").unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_current_to_opening() {
        let accounts = service();
        let account = accounts
            .create_account(&tenant(), CreateAccount::customer("Ravi").with_opening_balance(dec!(120)))
            .await
            .unwrap();
        assert_eq!(account.current_balance, dec!(120));
        assert_eq!(accounts.get_account(&tenant(), account.id).await.unwrap(), account);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let result = service().create_account(&tenant(), CreateAccount::customer("  ")).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_opening_balance_rejected() {
        let result = service()
            .create_account(
                &tenant(),
                CreateAccount::customer("Ravi").with_opening_balance(Decimal::MAX / dec!(2)),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cross_tenant_get_is_forbidden() {
        let accounts = service();
        let account = accounts.create_account(&tenant(), CreateAccount::bank("HDFC")).await.unwrap();
        let other = TenantId::new("OTHER").unwrap();
        assert!(matches!(
            accounts.get_account(&other, account.id).await,
            Err(LedgerError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_account_not_found() {
        let result = service().get_account(&tenant(), AccountId::new_v7()).await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cash_in_hand_is_singleton() {
        let accounts = service();
        let first = accounts.get_or_create_cash_in_hand(&tenant()).await.unwrap();
        let second = accounts.get_or_create_cash_in_hand(&tenant()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.kind, AccountKind::Cash);
        assert_eq!(first.current_balance, dec!(0));
    }

    #[tokio::test]
    async fn test_delete_unmoved_account() {
        let accounts = service();
        let account = accounts.create_account(&tenant(), CreateAccount::supplier("Metro")).await.unwrap();
        accounts.delete_account(&tenant(), account.id).await.unwrap();
        assert!(matches!(
            accounts.get_account(&tenant(), account.id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_is_filtered_by_kind() {
        let accounts = service();
        accounts.create_account(&tenant(), CreateAccount::customer("A")).await.unwrap();
        accounts.create_account(&tenant(), CreateAccount::supplier("B")).await.unwrap();
        let customers = accounts
            .list_accounts(&tenant(), AccountQuery::by_kind(AccountKind::Customer))
            .await
            .unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].name, "A");
    }
}
