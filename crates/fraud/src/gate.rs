use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use walletd_wallet::{Transaction, TransactionStatus, TransactionType};

use crate::context::{FraudContext, RequestOrigin};
use crate::limits::FraudLimits;

/// The part of a movement request the gate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementRequest {
    pub amount: Decimal,
    pub kind: TransactionType,
}

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FraudRejection {
    #[error("Transaction amount outside allowed limits")]
    AmountOutOfRange { min: Decimal, max: Decimal },

    #[error("Multiple failed attempts detected. Please contact support.")]
    TooManyFailedAttempts { count: usize },

    #[error("Daily transfer limit exceeded")]
    DailyLimitExceeded {
        used: Decimal,
        requested: Decimal,
        limit: Decimal,
    },
}

impl FraudRejection {
    pub fn code(&self) -> &'static str {
        match self {
            FraudRejection::AmountOutOfRange { .. } => "amount_out_of_range",
            FraudRejection::TooManyFailedAttempts { .. } => "too_many_failed_attempts",
            FraudRejection::DailyLimitExceeded { .. } => "daily_limit_exceeded",
        }
    }
}

/// Evaluate a movement against the account's recent history.
///
/// `history` should hold every transaction the account took part in (as
/// sender or receiver) over the rolling window; entries older than the window
/// are ignored. Rules run in order and the first failure wins:
/// amount bounds, failed-attempt lockout, then (transfers only) the daily
/// transfer limit.
pub fn screen(
    history: &[Transaction],
    request: &MovementRequest,
    limits: &FraudLimits,
    origin: RequestOrigin,
    now: DateTime<Utc>,
) -> Result<FraudContext, FraudRejection> {
    if request.amount < limits.min_transaction_amount
        || request.amount > limits.max_transaction_amount
    {
        return Err(FraudRejection::AmountOutOfRange {
            min: limits.min_transaction_amount,
            max: limits.max_transaction_amount,
        });
    }

    let since = limits.window_start(now);
    let failed = history
        .iter()
        .filter(|tx| tx.created_at >= since && tx.status == TransactionStatus::Failed)
        .count();
    if failed >= limits.failed_attempt_threshold {
        return Err(FraudRejection::TooManyFailedAttempts { count: failed });
    }

    if request.kind == TransactionType::Transfer {
        check_daily_limit(history, request.amount, limits, now)?;
    }

    Ok(FraudContext::stamped(origin, now))
}

/// Completed transfers in the window plus `amount` must not exceed the daily
/// transfer limit.
///
/// The ledger re-runs this under the account lock so two concurrent requests
/// cannot both pass against the same stale total.
pub fn check_daily_limit(
    history: &[Transaction],
    amount: Decimal,
    limits: &FraudLimits,
    now: DateTime<Utc>,
) -> Result<(), FraudRejection> {
    let since = limits.window_start(now);
    let used: Decimal = history
        .iter()
        .filter(|tx| {
            tx.created_at >= since
                && tx.kind == TransactionType::Transfer
                && tx.status == TransactionStatus::Completed
        })
        .map(|tx| tx.amount.value())
        .sum();

    if used + amount > limits.max_daily_transfer {
        return Err(FraudRejection::DailyLimitExceeded {
            used,
            requested: amount,
            limit: limits.max_daily_transfer,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use walletd_core::{AccountId, Amount, Currency, TransactionId};
    use walletd_wallet::{FraudReason, NewTransaction};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn record(
        kind: TransactionType,
        amount: Decimal,
        status: TransactionStatus,
        at: DateTime<Utc>,
    ) -> Transaction {
        let new = NewTransaction {
            id: TransactionId::new(),
            amount: Amount::new(amount).unwrap(),
            currency: Currency::Usd,
            description: None,
            metadata: None,
            created_at: at,
        };
        let me = AccountId::new();
        let tx = match kind {
            TransactionType::Deposit => Transaction::deposit(me, new),
            TransactionType::Withdrawal => Transaction::withdrawal(me, new),
            TransactionType::Transfer => Transaction::transfer(me, AccountId::new(), new),
        }
        .unwrap();
        match status {
            TransactionStatus::Pending => tx,
            TransactionStatus::Completed => tx.completed(at).unwrap(),
            TransactionStatus::Failed => tx.failed(FraudReason::SystemError, at).unwrap(),
            TransactionStatus::Flagged => tx
                .completed(at)
                .unwrap()
                .flagged(FraudReason::UnusualPattern, at)
                .unwrap(),
        }
    }

    fn transfer(amount: Decimal) -> MovementRequest {
        MovementRequest {
            amount,
            kind: TransactionType::Transfer,
        }
    }

    fn run(history: &[Transaction], request: MovementRequest) -> Result<FraudContext, FraudRejection> {
        screen(history, &request, &FraudLimits::default(), RequestOrigin::default(), now())
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        assert!(run(&[], transfer(dec!(1))).is_ok());
        assert!(run(&[], transfer(dec!(10000))).is_ok());
        assert_eq!(
            run(&[], transfer(dec!(0.99))).unwrap_err(),
            FraudRejection::AmountOutOfRange {
                min: dec!(1),
                max: dec!(10000)
            }
        );
        assert!(run(&[], transfer(dec!(10000.01))).is_err());
        assert!(run(&[], transfer(dec!(-5))).is_err());
    }

    #[test]
    fn three_failures_lock_out_any_movement() {
        let t = now() - Duration::hours(1);
        let two: Vec<_> = (0..2)
            .map(|_| record(TransactionType::Transfer, dec!(5), TransactionStatus::Failed, t))
            .collect();
        let deposit = MovementRequest {
            amount: dec!(5),
            kind: TransactionType::Deposit,
        };
        assert!(run(&two, deposit).is_ok());

        let mut three = two.clone();
        three.push(record(TransactionType::Withdrawal, dec!(5), TransactionStatus::Failed, t));
        assert_eq!(
            run(&three, deposit).unwrap_err(),
            FraudRejection::TooManyFailedAttempts { count: 3 }
        );
    }

    #[test]
    fn failures_outside_the_window_are_forgotten() {
        let old = now() - Duration::hours(25);
        let history: Vec<_> = (0..5)
            .map(|_| record(TransactionType::Transfer, dec!(5), TransactionStatus::Failed, old))
            .collect();
        assert!(run(&history, transfer(dec!(5))).is_ok());
    }

    #[test]
    fn daily_limit_counts_only_completed_transfers() {
        let t = now() - Duration::minutes(5);
        let history: Vec<_> = (0..5)
            .map(|_| record(TransactionType::Transfer, dec!(9800), TransactionStatus::Completed, t))
            .chain([
                record(TransactionType::Transfer, dec!(9000), TransactionStatus::Pending, t),
                record(TransactionType::Withdrawal, dec!(9000), TransactionStatus::Completed, t),
                record(TransactionType::Transfer, dec!(9000), TransactionStatus::Flagged, t),
            ])
            .collect();

        // 49_000 used: exactly reaching the limit is allowed.
        assert!(run(&history, transfer(dec!(1000))).is_ok());
        assert_eq!(
            run(&history, transfer(dec!(1000.01))).unwrap_err(),
            FraudRejection::DailyLimitExceeded {
                used: dec!(49000),
                requested: dec!(1000.01),
                limit: dec!(50000)
            }
        );
    }

    #[test]
    fn daily_limit_does_not_apply_to_withdrawals() {
        let t = now();
        let history: Vec<_> = (0..5)
            .map(|_| record(TransactionType::Transfer, dec!(10000), TransactionStatus::Completed, t))
            .collect();
        let withdrawal = MovementRequest {
            amount: dec!(100),
            kind: TransactionType::Withdrawal,
        };
        assert!(run(&history, withdrawal).is_ok());
        assert!(run(&history, transfer(dec!(100))).is_err());
    }

    #[test]
    fn passing_request_is_stamped_with_origin() {
        let origin = RequestOrigin {
            ip_address: Some("10.0.0.7".into()),
            user_agent: Some("curl/8".into()),
        };
        let at = now();
        let ctx = screen(&[], &transfer(dec!(10)), &FraudLimits::default(), origin, at).unwrap();
        assert_eq!(ctx.metadata().ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(ctx.metadata().user_agent.as_deref(), Some("curl/8"));
        assert_eq!(ctx.metadata().timestamp, at);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the daily limit never admits a transfer that would take
        /// the completed total above the limit.
        #[test]
        fn admitted_transfers_respect_daily_limit(
            prior in prop::collection::vec(1i64..10_000i64, 0..12),
            amount in 1i64..10_000i64,
        ) {
            let t = now();
            let history: Vec<_> = prior
                .iter()
                .map(|a| record(TransactionType::Transfer, Decimal::from(*a), TransactionStatus::Completed, t))
                .collect();
            let used: i64 = prior.iter().sum();

            let outcome = run(&history, transfer(Decimal::from(amount)));
            prop_assert_eq!(outcome.is_ok(), used + amount <= 50_000);
        }
    }
}
