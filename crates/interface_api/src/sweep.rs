//! Periodic reconciliation sweep
//!
//! Runs off the request path; drift is reported, never repaired.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use domain_ledger::{LedgerError, ReconciliationEngine};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepSummary {
    pub checked: usize,
    pub drifting: usize,
}

/// Reconciles every account once
pub async fn run_sweep(engine: &ReconciliationEngine) -> Result<SweepSummary, LedgerError> {
    let reports = engine.reconcile_all().await?;

    let mut summary = SweepSummary {
        checked: reports.len(),
        drifting: 0,
    };
    for report in reports.iter().filter(|r| !r.ok) {
        summary.drifting += 1;
        warn!(
            account_id = %report.account_id,
            tenant = %report.tenant,
            drift = %report.drift,
            invoice_violations = report.invoice_violations,
            "Account drifted from its transaction log"
        );
    }
    Ok(summary)
}

/// Spawns a task that sweeps every `period`
///
/// The first sweep runs one full period after startup.
pub fn spawn_reconciliation_sweep(engine: ReconciliationEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval fires immediately on the first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match run_sweep(&engine).await {
                Ok(summary) => info!(
                    checked = summary.checked,
                    drifting = summary.drifting,
                    "Reconciliation sweep complete"
                ),
                Err(e) => error!(error = %e, "Reconciliation sweep failed"),
            }
        }
    })
}
