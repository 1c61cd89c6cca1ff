use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Thresholds enforced by the gate before a movement is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudLimits {
    pub min_transaction_amount: Decimal,
    pub max_transaction_amount: Decimal,
    pub max_daily_transfer: Decimal,
    /// FAILED transactions in the window at which an account is locked out.
    pub failed_attempt_threshold: usize,
    pub window: Duration,
}

impl Default for FraudLimits {
    fn default() -> Self {
        Self {
            min_transaction_amount: Decimal::ONE,
            max_transaction_amount: Decimal::from(10_000),
            max_daily_transfer: Decimal::from(50_000),
            failed_attempt_threshold: 3,
            window: Duration::hours(24),
        }
    }
}

impl FraudLimits {
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }
}

/// Thresholds used by the background scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    /// More completed transfers than this in the window flags the sender.
    pub max_completed_transfers: usize,
    /// Withdrawals strictly above this amount are suspicious.
    pub suspicious_withdrawal_above: Decimal,
    pub failed_attempt_threshold: usize,
    pub window: Duration,
}

impl ScanRules {
    /// Suspicious withdrawals are those above 80% of the per-transaction maximum.
    pub fn from_limits(limits: &FraudLimits) -> Self {
        Self {
            max_completed_transfers: 10,
            suspicious_withdrawal_above: limits.max_transaction_amount * Decimal::new(8, 1),
            failed_attempt_threshold: limits.failed_attempt_threshold,
            window: limits.window,
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }
}

impl Default for ScanRules {
    fn default() -> Self {
        Self::from_limits(&FraudLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn suspicious_threshold_tracks_max_amount() {
        assert_eq!(ScanRules::default().suspicious_withdrawal_above, dec!(8000));

        let limits = FraudLimits {
            max_transaction_amount: dec!(500),
            ..FraudLimits::default()
        };
        assert_eq!(ScanRules::from_limits(&limits).suspicious_withdrawal_above, dec!(400));
    }
}
