//! End-to-end tests for the ledger services over the in-memory store

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{
    AccountId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantId, TransactionId,
};
use domain_ledger::{
    Account, AccountKind, AccountQuery, AccountStore, AllocationRecord, AppliedAllocation,
    CreateAccount, InMemoryLedgerStore, LedgerError, LedgerStore, LedgerUnit, NewTransaction,
    Page, ReconciliationEngine, ReconciliationSnapshot, RecordPayment, RecordPurchase, RecordReturn, RecordSale,
    Transaction, TransactionKind, TransactionLedger,
};

fn tenant() -> TenantId {
    TenantId::new("ACME01").unwrap()
}

struct Harness {
    store: Arc<InMemoryLedgerStore>,
    accounts: AccountStore,
    engine: ReconciliationEngine,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        Self {
            accounts: AccountStore::new(store.clone()),
            engine: ReconciliationEngine::new(store.clone()),
            store,
        }
    }

    fn ledger(&self) -> &TransactionLedger {
        self.engine.ledger()
    }

    async fn customer(&self) -> Account {
        self.accounts
            .create_account(&tenant(), CreateAccount::customer("Ravi Traders"))
            .await
            .unwrap()
    }

    async fn balance_of(&self, id: AccountId) -> Decimal {
        self.accounts.get_account(&tenant(), id).await.unwrap().current_balance
    }
}

// ============================================================================
// Scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_sale_then_full_payment() {
        let h = Harness::new();
        let customer = h.customer().await;

        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(1000), dec!(300)))
            .await
            .unwrap();
        assert_eq!(sale.account.current_balance, dec!(1000));
        assert_eq!(sale.transaction.remaining_amount, dec!(700));

        let paid = h
            .engine
            .record_payment(
                &tenant(),
                RecordPayment::new(customer.id, dec!(700)).targeting([sale.transaction.serial.clone()]),
            )
            .await
            .unwrap();

        assert_eq!(paid.account.current_balance, dec!(300));
        assert_eq!(paid.allocations.len(), 1);
        assert_eq!(paid.allocations[0].remaining_after, dec!(0));
        assert_eq!(paid.transaction.total_amount, dec!(0));
        assert_eq!(paid.transaction.remaining_amount, dec!(-700));

        let invoice = h.ledger().get_by_serial(&tenant(), &sale.transaction.serial).await.unwrap();
        assert_eq!(invoice.remaining_amount, dec!(0));
        assert_eq!(invoice.deposited_amount, dec!(1000));

        let report = h.engine.reconcile(&tenant(), customer.id).await.unwrap();
        assert!(report.ok);
    }

    #[tokio::test]
    async fn test_overpayment_leaves_balances_unchanged() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(1000), dec!(300)))
            .await
            .unwrap();
        let cash_before = h.accounts.get_or_create_cash_in_hand(&tenant()).await.unwrap();
        let rows_before = h.store.transaction_count().await;

        let result = h
            .engine
            .record_payment(&tenant(), RecordPayment::new(customer.id, dec!(1000)))
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::Overpayment { amount, unallocated }) if amount == dec!(1000) && unallocated == dec!(300)
        ));
        assert_eq!(h.balance_of(customer.id).await, dec!(1000));
        assert_eq!(h.balance_of(cash_before.id).await, cash_before.current_balance);
        assert_eq!(h.store.transaction_count().await, rows_before);

        let invoice = h.ledger().get_by_serial(&tenant(), &sale.transaction.serial).await.unwrap();
        assert_eq!(invoice.remaining_amount, dec!(700));
    }

    #[tokio::test]
    async fn test_return_above_original_total() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(150), dec!(0)))
            .await
            .unwrap();

        let result = h
            .engine
            .record_return(
                &tenant(),
                RecordReturn::new(customer.id, dec!(200)).against(sale.transaction.serial.clone()),
            )
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::OverReturn { requested, available, .. })
                if requested == dec!(200) && available == dec!(150)
        ));
        assert_eq!(h.balance_of(customer.id).await, dec!(150));
    }

    #[tokio::test]
    async fn test_concurrent_sales_do_not_lose_updates() {
        let h = Harness::new();
        let customer = h.customer().await;

        let tenant_a = tenant();
        let tenant_b = tenant();
        let first = h
            .engine
            .record_sale(&tenant_a, RecordSale::new(customer.id, dec!(100), dec!(0)));
        let second = h
            .engine
            .record_sale(&tenant_b, RecordSale::new(customer.id, dec!(100), dec!(0)));
        let (a, b) = tokio::join!(first, second);
        a.unwrap();
        b.unwrap();

        assert_eq!(h.balance_of(customer.id).await, dec!(200));
        let rows = h
            .ledger()
            .list_by_account(&tenant(), customer.id, Page::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sales_across_tasks() {
        let h = Harness::new();
        let customer = h.customer().await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = h.engine.clone();
            let id = customer.id;
            handles.push(tokio::spawn(async move {
                engine.record_sale(&tenant(), RecordSale::new(id, dec!(100), dec!(10))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(h.balance_of(customer.id).await, dec!(2000));
        let cash = h.accounts.get_or_create_cash_in_hand(&tenant()).await.unwrap();
        assert_eq!(cash.current_balance, dec!(200));
        assert!(h.engine.reconcile_all().await.unwrap().iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn test_out_of_range_sale_rejected_without_panicking() {
        let h = Harness::new();
        let customer = h.customer().await;
        let huge = Decimal::MAX / dec!(2) + dec!(1000);

        for _ in 0..2 {
            let result = h
                .engine
                .record_sale(&tenant(), RecordSale::new(customer.id, huge, dec!(0)))
                .await;
            assert!(matches!(result, Err(LedgerError::Validation(_))));
        }
        assert_eq!(h.balance_of(customer.id).await, dec!(0));
        assert_eq!(h.store.transaction_count().await, 0);

        for _ in 0..2 {
            h.engine
                .record_sale(&tenant(), RecordSale::new(customer.id, core_kernel::MAX_AMOUNT, dec!(0)))
                .await
                .unwrap();
        }
        assert_eq!(h.balance_of(customer.id).await, core_kernel::MAX_AMOUNT * dec!(2));
        assert!(h.engine.reconcile(&tenant(), customer.id).await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_balance_at_column_limit_refuses_further_sales() {
        let h = Harness::new();
        let customer = Account::new(tenant(), AccountKind::Customer, "Ravi Traders", core_kernel::MAX_BALANCE);
        let mut unit = h.store.begin().await.unwrap();
        unit.insert_account(&customer).await.unwrap();
        unit.commit().await.unwrap();

        let result = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(1), dec!(0)))
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(h.balance_of(customer.id).await, core_kernel::MAX_BALANCE);
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_with_moved_balance_conflicts() {
        let h = Harness::new();
        let customer = h.customer().await;
        h.engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(50), dec!(0)))
            .await
            .unwrap();

        let result = h.accounts.delete_account(&tenant(), customer.id).await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
        assert!(h.accounts.get_account(&tenant(), customer.id).await.is_ok());
    }
}

// ============================================================================
// Account store
// ============================================================================

mod account_store {
    use super::*;

    #[tokio::test]
    async fn test_delete_with_history_but_opening_balance_conflicts() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(40), dec!(0)))
            .await
            .unwrap();
        h.engine
            .record_return(
                &tenant(),
                RecordReturn::new(customer.id, dec!(40)).against(sale.transaction.serial),
            )
            .await
            .unwrap();
        assert_eq!(h.balance_of(customer.id).await, dec!(0));

        let result = h.accounts.delete_account(&tenant(), customer.id).await;
        assert!(matches!(result, Err(LedgerError::Conflict(message)) if message.contains("referenced")));
    }

    #[tokio::test]
    async fn test_cash_in_hand_used_as_settlement_cannot_be_deleted() {
        let h = Harness::new();
        let customer = h.customer().await;
        let cash = h.accounts.get_or_create_cash_in_hand(&tenant()).await.unwrap();
        h.engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(10), dec!(10)))
            .await
            .unwrap();

        assert!(matches!(
            h.accounts.delete_account(&tenant(), cash.id).await,
            Err(LedgerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_update_cannot_touch_money() {
        let h = Harness::new();
        let customer = h.customer().await;
        h.engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(75), dec!(0)))
            .await
            .unwrap();

        let updated = h
            .accounts
            .update_account_metadata(
                &tenant(),
                customer.id,
                domain_ledger::AccountMetadataUpdate {
                    contact: Some("+91 98450 00000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.contact.as_deref(), Some("+91 98450 00000"));
        assert_eq!(updated.current_balance, dec!(75));
        assert_eq!(updated.sale_total, dec!(75));
    }

    #[tokio::test]
    async fn test_accounts_listed_newest_first_per_tenant() {
        let h = Harness::new();
        let other = TenantId::new("OTHER").unwrap();
        for name in ["first", "second", "third"] {
            h.accounts.create_account(&tenant(), CreateAccount::customer(name)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        h.accounts.create_account(&other, CreateAccount::customer("foreign")).await.unwrap();

        let listed = h.accounts.list_accounts(&tenant(), AccountQuery::default()).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);

        let paged = h
            .accounts
            .list_accounts(&tenant(), AccountQuery::default().paginate(1, 1))
            .await
            .unwrap();
        assert_eq!(paged[0].name, "second");
    }

    #[tokio::test]
    async fn test_cross_tenant_mutation_forbidden() {
        let h = Harness::new();
        let customer = h.customer().await;
        let intruder = TenantId::new("OTHER").unwrap();

        let sale = h
            .engine
            .record_sale(&intruder, RecordSale::new(customer.id, dec!(10), dec!(0)))
            .await;
        assert!(matches!(sale, Err(LedgerError::Forbidden(_))));

        let delete = h.accounts.delete_account(&intruder, customer.id).await;
        assert!(matches!(delete, Err(LedgerError::Forbidden(_))));
    }
}

// ============================================================================
// Payments
// ============================================================================

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_default_targets_settle_oldest_date_first() {
        let h = Harness::new();
        let customer = h.customer().await;
        let older = chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let newer = chrono::NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();

        let late = h
            .engine
            .record_sale(
                &tenant(),
                RecordSale::new(customer.id, dec!(100), dec!(0))
                    .with_meta(domain_ledger::TransactionMeta::on(newer)),
            )
            .await
            .unwrap();
        let early = h
            .engine
            .record_sale(
                &tenant(),
                RecordSale::new(customer.id, dec!(100), dec!(0))
                    .with_meta(domain_ledger::TransactionMeta::on(older)),
            )
            .await
            .unwrap();

        let paid = h
            .engine
            .record_payment(&tenant(), RecordPayment::new(customer.id, dec!(120)))
            .await
            .unwrap();

        assert_eq!(paid.allocations[0].invoice_serial, early.transaction.serial);
        assert_eq!(paid.allocations[0].amount_applied, dec!(100));
        assert_eq!(paid.allocations[1].invoice_serial, late.transaction.serial);
        assert_eq!(paid.allocations[1].amount_applied, dec!(20));
        assert_eq!(paid.account.current_balance, dec!(80));
        assert_eq!(paid.account.deposited_sale_total, dec!(120));
    }

    #[tokio::test]
    async fn test_allocations_are_persisted() {
        let h = Harness::new();
        let customer = h.customer().await;
        h.engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(60), dec!(0)))
            .await
            .unwrap();
        h.engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(60), dec!(0)))
            .await
            .unwrap();

        let paid = h
            .engine
            .record_payment(&tenant(), RecordPayment::new(customer.id, dec!(90)))
            .await
            .unwrap();

        let records = h
            .ledger()
            .list_allocations(&tenant(), &paid.transaction.serial)
            .await
            .unwrap();
        let total: Decimal = records.iter().map(|r| r.amount_applied).sum();
        assert_eq!(records.len(), 2);
        assert_eq!(total, dec!(90));
        assert!(records.iter().all(|r| r.payment_serial == paid.transaction.serial));
    }

    #[tokio::test]
    async fn test_mixed_target_kinds_rejected() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(60), dec!(0)))
            .await
            .unwrap();
        let purchase = h
            .engine
            .record_purchase(&tenant(), RecordPurchase::new(customer.id, dec!(60), dec!(0)))
            .await
            .unwrap();

        let result = h
            .engine
            .record_payment(
                &tenant(),
                RecordPayment::new(customer.id, dec!(10))
                    .targeting([sale.transaction.serial, purchase.transaction.serial]),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_repeated_target_rejected_before_settling() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(100), dec!(0)))
            .await
            .unwrap();
        let serial = sale.transaction.serial;

        let result = h
            .engine
            .record_payment(
                &tenant(),
                RecordPayment::new(customer.id, dec!(100)).targeting([serial.clone(), serial.clone()]),
            )
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert_eq!(h.balance_of(customer.id).await, dec!(100));
        let invoice = h.ledger().get_by_serial(&tenant(), &serial).await.unwrap();
        assert_eq!(invoice.remaining_amount, dec!(100));
        assert_eq!(h.store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn test_target_on_other_account_not_found() {
        let h = Harness::new();
        let customer = h.customer().await;
        let other = h
            .accounts
            .create_account(&tenant(), CreateAccount::customer("Other"))
            .await
            .unwrap();
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(other.id, dec!(60), dec!(0)))
            .await
            .unwrap();

        let result = h
            .engine
            .record_payment(
                &tenant(),
                RecordPayment::new(customer.id, dec!(10)).targeting([sale.transaction.serial]),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_overpayment_on_last_invoice_rolls_back_earlier_ones() {
        let h = Harness::new();
        let customer = h.customer().await;
        let first = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(100), dec!(0)))
            .await
            .unwrap();
        let second = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(100), dec!(0)))
            .await
            .unwrap();

        let result = h
            .engine
            .record_payment(
                &tenant(),
                RecordPayment::new(customer.id, dec!(250))
                    .targeting([first.transaction.serial.clone(), second.transaction.serial.clone()]),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Overpayment { .. })));

        for serial in [first.transaction.serial, second.transaction.serial] {
            let invoice = h.ledger().get_by_serial(&tenant(), &serial).await.unwrap();
            assert_eq!(invoice.remaining_amount, dec!(100));
        }
    }
}

// ============================================================================
// Returns
// ============================================================================

mod returns {
    use super::*;

    #[tokio::test]
    async fn test_cumulative_returns_are_capped() {
        let h = Harness::new();
        let customer = h.customer().await;
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(150), dec!(0)))
            .await
            .unwrap();
        let serial = sale.transaction.serial.clone();

        h.engine
            .record_return(&tenant(), RecordReturn::new(customer.id, dec!(100)).against(serial.clone()))
            .await
            .unwrap();
        let second = h
            .engine
            .record_return(&tenant(), RecordReturn::new(customer.id, dec!(60)).against(serial.clone()))
            .await;

        assert!(matches!(
            second,
            Err(LedgerError::OverReturn { available, .. }) if available == dec!(50)
        ));

        let last = h
            .engine
            .record_return(&tenant(), RecordReturn::new(customer.id, dec!(50)).against(serial))
            .await
            .unwrap();
        assert_eq!(last.account.current_balance, dec!(0));
        assert_eq!(last.account.sale_return_total, dec!(150));
    }

    #[tokio::test]
    async fn test_refund_leg_moves_cash() {
        let h = Harness::new();
        let customer = h.customer().await;
        let bank = h
            .accounts
            .create_account(&tenant(), CreateAccount::bank("HDFC").with_opening_balance(dec!(500)))
            .await
            .unwrap();
        let sale = h
            .engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(200), dec!(200)).settle_via(bank.id))
            .await
            .unwrap();
        assert_eq!(sale.settlement.as_ref().unwrap().account.current_balance, dec!(700));

        let refunded = h
            .engine
            .record_return(
                &tenant(),
                RecordReturn::new(customer.id, dec!(80))
                    .against(sale.transaction.serial)
                    .refund_via(bank.id),
            )
            .await
            .unwrap();

        assert_eq!(refunded.account.current_balance, dec!(120));
        let leg = refunded.settlement.unwrap();
        assert_eq!(leg.account.current_balance, dec!(620));
        assert_eq!(leg.transaction.kind, TransactionKind::Return);
        assert_eq!(leg.transaction.counterpart_account_id, Some(customer.id));
    }

    #[tokio::test]
    async fn test_purchase_return_raises_supplier_balance() {
        let h = Harness::new();
        let supplier = h
            .accounts
            .create_account(&tenant(), CreateAccount::supplier("Metro"))
            .await
            .unwrap();
        let purchase = h
            .engine
            .record_purchase(&tenant(), RecordPurchase::new(supplier.id, dec!(300), dec!(0)))
            .await
            .unwrap();
        assert_eq!(purchase.account.current_balance, dec!(-300));

        let returned = h
            .engine
            .record_return(
                &tenant(),
                RecordReturn::new(supplier.id, dec!(100)).against(purchase.transaction.serial),
            )
            .await
            .unwrap();
        assert_eq!(returned.account.current_balance, dec!(-200));
        assert_eq!(returned.account.purchase_return_total, dec!(100));
    }

    #[tokio::test]
    async fn test_return_on_bank_needs_original() {
        let h = Harness::new();
        let bank = h
            .accounts
            .create_account(&tenant(), CreateAccount::bank("HDFC"))
            .await
            .unwrap();
        let result = h
            .engine
            .record_return(&tenant(), RecordReturn::new(bank.id, dec!(10)))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}

// ============================================================================
// Atomicity under storage failure
// ============================================================================

mod atomicity {
    use super::*;

    /// Which unit operation should fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FailOn {
        SaveBalances { call: usize },
        InsertAllocation,
        Commit,
        Begin,
    }

    /// Store wrapper that injects a storage failure into every unit
    struct FailingStore {
        inner: InMemoryLedgerStore,
        fail_on: FailOn,
    }

    struct FailingUnit {
        inner: Box<dyn LedgerUnit>,
        fail_on: FailOn,
        save_calls: usize,
    }

    fn injected() -> PortError {
        PortError::connection("injected failure")
    }

    impl DomainPort for FailingStore {}

    #[async_trait]
    impl HealthCheckable for FailingStore {
        async fn health_check(&self) -> HealthCheckResult {
            self.inner.health_check().await
        }
    }

    #[async_trait]
    impl LedgerUnit for FailingUnit {
        async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError> {
            self.inner.lock_account(id).await
        }

        async fn find_cash_in_hand(&mut self, tenant: &TenantId) -> Result<Option<Account>, PortError> {
            self.inner.find_cash_in_hand(tenant).await
        }

        async fn insert_account(&mut self, account: &Account) -> Result<bool, PortError> {
            self.inner.insert_account(account).await
        }

        async fn save_metadata(&mut self, account: &Account) -> Result<(), PortError> {
            self.inner.save_metadata(account).await
        }

        async fn save_balances(&mut self, account: &Account) -> Result<(), PortError> {
            self.save_calls += 1;
            if self.fail_on == (FailOn::SaveBalances { call: self.save_calls }) {
                return Err(injected());
            }
            self.inner.save_balances(account).await
        }

        async fn delete_account(&mut self, id: AccountId) -> Result<(), PortError> {
            self.inner.delete_account(id).await
        }

        async fn count_transactions(&mut self, account_id: AccountId) -> Result<u64, PortError> {
            self.inner.count_transactions(account_id).await
        }

        async fn insert_transaction(&mut self, row: &NewTransaction) -> Result<Option<Transaction>, PortError> {
            self.inner.insert_transaction(row).await
        }

        async fn lock_transaction(
            &mut self,
            tenant: &TenantId,
            serial: &str,
        ) -> Result<Option<Transaction>, PortError> {
            self.inner.lock_transaction(tenant, serial).await
        }

        async fn lock_open_invoices(&mut self, account_id: AccountId) -> Result<Vec<Transaction>, PortError> {
            self.inner.lock_open_invoices(account_id).await
        }

        async fn save_settlement(&mut self, invoice: &Transaction) -> Result<(), PortError> {
            self.inner.save_settlement(invoice).await
        }

        async fn returned_against(
            &mut self,
            account_id: AccountId,
            original_serial: &str,
        ) -> Result<Decimal, PortError> {
            self.inner.returned_against(account_id, original_serial).await
        }

        async fn insert_allocation(
            &mut self,
            payment: &Transaction,
            allocation: &AppliedAllocation,
        ) -> Result<(), PortError> {
            if self.fail_on == FailOn::InsertAllocation {
                return Err(injected());
            }
            self.inner.insert_allocation(payment, allocation).await
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            if self.fail_on == FailOn::Commit {
                return Err(injected());
            }
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), PortError> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl LedgerStore for FailingStore {
        async fn begin(&self) -> Result<Box<dyn LedgerUnit>, PortError> {
            if self.fail_on == FailOn::Begin {
                return Err(injected());
            }
            Ok(Box::new(FailingUnit {
                inner: self.inner.begin().await?,
                fail_on: self.fail_on,
                save_calls: 0,
            }))
        }

        async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PortError> {
            self.inner.find_account(id).await
        }

        async fn list_accounts(&self, tenant: &TenantId, query: &AccountQuery) -> Result<Vec<Account>, PortError> {
            self.inner.list_accounts(tenant, query).await
        }

        async fn list_account_ids(&self) -> Result<Vec<(TenantId, AccountId)>, PortError> {
            self.inner.list_account_ids().await
        }

        async fn find_transaction(&self, tenant: &TenantId, serial: &str) -> Result<Option<Transaction>, PortError> {
            self.inner.find_transaction(tenant, serial).await
        }

        async fn list_transactions(&self, account_id: AccountId, page: Page) -> Result<Vec<Transaction>, PortError> {
            self.inner.list_transactions(account_id, page).await
        }

        async fn sum_balance_change(&self, account_id: AccountId) -> Result<Decimal, PortError> {
            self.inner.sum_balance_change(account_id).await
        }

        async fn reconciliation_snapshot(&self, id: AccountId) -> Result<Option<ReconciliationSnapshot>, PortError> {
            self.inner.reconciliation_snapshot(id).await
        }

        async fn list_allocations(&self, payment_id: TransactionId) -> Result<Vec<AllocationRecord>, PortError> {
            self.inner.list_allocations(payment_id).await
        }
    }

    /// Seeds a customer with one open 500 invoice, then returns an engine whose
    /// units fail at `fail_on`
    async fn seeded(fail_on: FailOn) -> (InMemoryLedgerStore, ReconciliationEngine, Account) {
        let inner = InMemoryLedgerStore::new();
        let healthy: Arc<dyn LedgerStore> = Arc::new(inner.clone());
        let customer = AccountStore::new(healthy.clone())
            .create_account(&tenant(), CreateAccount::customer("Ravi"))
            .await
            .unwrap();
        ReconciliationEngine::new(healthy)
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(500), dec!(0)))
            .await
            .unwrap();

        let failing = Arc::new(FailingStore {
            inner: inner.clone(),
            fail_on,
        });
        (inner, ReconciliationEngine::new(failing), customer)
    }

    async fn assert_untouched(store: &InMemoryLedgerStore, customer: &Account) {
        let account = store.find_account(customer.id).await.unwrap().unwrap();
        assert_eq!(account.current_balance, dec!(500));
        assert_eq!(account.deposited_sale_total, dec!(0));
        assert_eq!(store.transaction_count().await, 1);

        let rows = store.list_transactions(customer.id, Page::default()).await.unwrap();
        assert_eq!(rows[0].remaining_amount, dec!(500));
    }

    #[tokio::test]
    async fn test_failed_cash_leg_rolls_back_ledger_side() {
        // call 1 saves the customer, call 2 the cash in hand
        let (store, engine, customer) = seeded(FailOn::SaveBalances { call: 2 }).await;

        let result = engine
            .record_payment(&tenant(), RecordPayment::new(customer.id, dec!(200)))
            .await;

        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_untouched(&store, &customer).await;
    }

    #[tokio::test]
    async fn test_failed_allocation_write_rolls_back_settlements() {
        let (store, engine, customer) = seeded(FailOn::InsertAllocation).await;

        let result = engine
            .record_payment(&tenant(), RecordPayment::new(customer.id, dec!(200)))
            .await;

        assert!(result.is_err());
        assert_untouched(&store, &customer).await;
    }

    #[tokio::test]
    async fn test_reconcile_reads_without_opening_a_unit() {
        let (_, engine, customer) = seeded(FailOn::Begin).await;

        let report = engine.reconcile(&tenant(), customer.id).await.unwrap();
        assert!(report.ok);
        assert_eq!(report.expected_balance, dec!(500));
        assert_eq!(report.transaction_count, 1);
        assert!(engine.reconcile_all().await.unwrap().iter().all(|r| r.ok));

        let blocked = engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(10), dec!(0)))
            .await;
        assert!(matches!(blocked, Err(LedgerError::Storage(_))));
    }

    #[tokio::test]
    async fn test_failed_commit_persists_nothing() {
        let (store, engine, customer) = seeded(FailOn::Commit).await;

        let result = engine
            .record_sale(&tenant(), RecordSale::new(customer.id, dec!(10), dec!(10)))
            .await;

        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_untouched(&store, &customer).await;
        let reports = ReconciliationEngine::new(Arc::new(store)).reconcile_all().await.unwrap();
        assert!(reports.iter().all(|r| r.ok));
    }
}

#[tokio::test]
async fn test_account_kind_parses_from_wire_names() {
    assert_eq!("supplier".parse::<AccountKind>().unwrap(), AccountKind::Supplier);
}
