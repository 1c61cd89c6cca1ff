use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use walletd_fraud::{ScanRules, classify};

use crate::store::{StoreError, WalletStore};

/// Summary of one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub findings: usize,
    pub flagged: usize,
    /// Stopped early because of shutdown.
    pub interrupted: bool,
}

/// Re-examines the last window of settled history and marks suspicious
/// records. Writes only fraud fields, never balances, and takes no account
/// locks.
#[derive(Debug, Clone)]
pub struct FraudScanner<S> {
    store: S,
    rules: ScanRules,
}

impl<S: WalletStore> FraudScanner<S> {
    pub fn new(store: S, rules: ScanRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// One pass over `[now - window, now]`. Each finding is applied as a
    /// single bulk update; `cancel` is honoured between updates.
    pub async fn scan(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, StoreError> {
        let window = self
            .store
            .recent_transactions(self.rules.window_start(now))
            .await?;
        let findings = classify(&window, &self.rules);

        let mut report = ScanReport {
            scanned: window.len(),
            findings: findings.len(),
            ..ScanReport::default()
        };

        for finding in findings {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let n = self
                .store
                .flag_transactions(&finding.transaction_ids, finding.reason, now)
                .await?;
            debug!(
                sender = %finding.sender,
                reason = finding.reason.as_str(),
                flagged = n,
                "fraud rule matched"
            );
            report.flagged += n;
        }

        info!(
            scanned = report.scanned,
            findings = report.findings,
            flagged = report.flagged,
            interrupted = report.interrupted,
            "fraud scan finished"
        );
        Ok(report)
    }
}
