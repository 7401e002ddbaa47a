//! Billing DTOs
//!
//! Sales and purchases arrive either as aggregated totals or as the line
//! items the billing service produced. Lines are only summed here; pricing
//! stays with the billing service.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::{money, AccountId};
use domain_ledger::{RecordPayment, RecordPurchase, RecordReturn, RecordSale, TransactionMeta};

use crate::error::ApiError;

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("non_negative").with_message("must not be negative".into()));
    }
    Ok(())
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("positive").with_message("must be greater than zero".into()));
    }
    Ok(())
}

fn sum_lines(field: &'static str, mut values: impl Iterator<Item = Decimal>) -> Result<Decimal, ApiError> {
    values.try_fold(Decimal::ZERO, |acc, value| {
        money::checked_add(field, acc, value).map_err(|e| ApiError::validation(e.to_string()))
    })
}

/// One billed item
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaleLine {
    pub item_id: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub total_price: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub paid_amount: Decimal,
}

/// Body of `POST /accounts/:id/sales` and `/purchases`
#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceRequest {
    pub total_amount: Option<Decimal>,
    pub deposited_amount: Option<Decimal>,
    #[serde(default)]
    #[validate(nested)]
    pub lines: Vec<SaleLine>,
    /// Bank or cash account receiving the deposit
    pub settle_via: Option<AccountId>,
    pub date: Option<NaiveDate>,
    pub origin_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl InvoiceRequest {
    /// Resolves `(total, deposited)` from explicit totals or summed lines
    ///
    /// When both are sent they must agree.
    pub fn amounts(&self) -> Result<(Decimal, Decimal), ApiError> {
        let summed = if self.lines.is_empty() {
            None
        } else {
            let total = sum_lines("total_price", self.lines.iter().map(|l| l.total_price))?;
            let paid = sum_lines("paid_amount", self.lines.iter().map(|l| l.paid_amount))?;
            Some((total, paid))
        };

        match (self.total_amount, summed) {
            (None, None) => Err(ApiError::validation(
                "either total_amount or lines is required",
            )),
            (None, Some(summed)) => match self.deposited_amount {
                Some(deposited) if deposited != summed.1 => Err(ApiError::validation(format!(
                    "deposited_amount {} does not match the sum of line payments {}",
                    deposited, summed.1
                ))),
                _ => Ok(summed),
            },
            (Some(total), None) => Ok((total, self.deposited_amount.unwrap_or(Decimal::ZERO))),
            (Some(total), Some((line_total, line_paid))) => {
                if total != line_total {
                    return Err(ApiError::validation(format!(
                        "total_amount {} does not match the sum of line totals {}",
                        total, line_total
                    )));
                }
                let deposited = self.deposited_amount.unwrap_or(line_paid);
                if deposited != line_paid {
                    return Err(ApiError::validation(format!(
                        "deposited_amount {} does not match the sum of line payments {}",
                        deposited, line_paid
                    )));
                }
                Ok((total, deposited))
            }
        }
    }

    fn meta(&self) -> TransactionMeta {
        TransactionMeta {
            date: self.date,
            origin_id: self.origin_id,
            note: self.note.clone(),
        }
    }

    pub fn into_sale(self, account_id: AccountId) -> Result<RecordSale, ApiError> {
        let (total, deposited) = self.amounts()?;
        let mut cmd = RecordSale::new(account_id, total, deposited).with_meta(self.meta());
        if let Some(via) = self.settle_via {
            cmd = cmd.settle_via(via);
        }
        Ok(cmd)
    }

    pub fn into_purchase(self, account_id: AccountId) -> Result<RecordPurchase, ApiError> {
        let (total, deposited) = self.amounts()?;
        let mut cmd = RecordPurchase::new(account_id, total, deposited).with_meta(self.meta());
        if let Some(via) = self.settle_via {
            cmd = cmd.settle_via(via);
        }
        Ok(cmd)
    }
}

/// Body of `POST /accounts/:id/payments`
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    /// Invoice serials to settle in order; omitted means oldest open first
    #[serde(default)]
    pub target_invoices: Vec<String>,
    pub settle_via: Option<AccountId>,
    pub date: Option<NaiveDate>,
    pub origin_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl PaymentRequest {
    pub fn into_command(self, account_id: AccountId) -> RecordPayment {
        let meta = TransactionMeta {
            date: self.date,
            origin_id: self.origin_id,
            note: self.note,
        };
        let mut cmd = RecordPayment::new(account_id, self.amount)
            .targeting(self.target_invoices)
            .with_meta(meta);
        if let Some(via) = self.settle_via {
            cmd = cmd.settle_via(via);
        }
        cmd
    }
}

/// Body of `POST /accounts/:id/returns`
#[derive(Debug, Deserialize, Validate)]
pub struct ReturnRequest {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub original_serial: Option<String>,
    /// Bank or cash account the refund moves through; omitted means no refund
    pub refund_via: Option<AccountId>,
    pub date: Option<NaiveDate>,
    pub origin_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl ReturnRequest {
    pub fn into_command(self, account_id: AccountId) -> RecordReturn {
        let meta = TransactionMeta {
            date: self.date,
            origin_id: self.origin_id,
            note: self.note,
        };
        let mut cmd = RecordReturn::new(account_id, self.amount).with_meta(meta);
        if let Some(serial) = self.original_serial {
            cmd = cmd.against(serial);
        }
        if let Some(via) = self.refund_via {
            cmd = cmd.refund_via(via);
        }
        cmd
    }
}
