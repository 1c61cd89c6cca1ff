use std::collections::BTreeMap;

use walletd_core::{AccountId, TransactionId};
use walletd_wallet::{FraudReason, Transaction, TransactionStatus, TransactionType};

use crate::limits::ScanRules;

/// One bulk flag to apply: every listed transaction gets `reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFinding {
    pub sender: AccountId,
    pub reason: FraudReason,
    pub transaction_ids: Vec<TransactionId>,
}

/// Classify a window of settled history.
///
/// Transactions are grouped by sender (deposits have none and are skipped).
/// For each sender the rules run in a fixed order:
///
/// 1. more than `max_completed_transfers` completed transfers flags the
///    sender's whole set with `RATE_LIMIT_EXCEEDED`;
/// 2. withdrawals above `suspicious_withdrawal_above` are flagged
///    `SUSPICIOUS_AMOUNT` (only those records);
/// 3. `failed_attempt_threshold` or more failures flags the whole set with
///    `MULTIPLE_FAILED_ATTEMPTS`.
///
/// Findings come back in that order, so applying them one after another
/// leaves the last matching rule's reason on a record flagged twice.
pub fn classify(transactions: &[Transaction], rules: &ScanRules) -> Vec<ScanFinding> {
    let mut by_sender: BTreeMap<AccountId, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        if let Some(sender) = tx.sender {
            by_sender.entry(sender).or_default().push(tx);
        }
    }

    let mut findings = Vec::new();
    for (sender, txs) in by_sender {
        let all_ids = || txs.iter().map(|tx| tx.id).collect::<Vec<_>>();

        let completed_transfers = txs
            .iter()
            .filter(|tx| {
                tx.kind == TransactionType::Transfer && tx.status == TransactionStatus::Completed
            })
            .count();
        if completed_transfers > rules.max_completed_transfers {
            findings.push(ScanFinding {
                sender,
                reason: FraudReason::RateLimitExceeded,
                transaction_ids: all_ids(),
            });
        }

        let suspicious: Vec<_> = txs
            .iter()
            .filter(|tx| {
                tx.kind == TransactionType::Withdrawal
                    && tx.amount.value() > rules.suspicious_withdrawal_above
            })
            .map(|tx| tx.id)
            .collect();
        if !suspicious.is_empty() {
            findings.push(ScanFinding {
                sender,
                reason: FraudReason::SuspiciousAmount,
                transaction_ids: suspicious,
            });
        }

        let failed = txs
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Failed)
            .count();
        if failed >= rules.failed_attempt_threshold {
            findings.push(ScanFinding {
                sender,
                reason: FraudReason::MultipleFailedAttempts,
                transaction_ids: all_ids(),
            });
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use walletd_core::{Amount, Currency};
    use walletd_wallet::NewTransaction;

    fn new_tx(amount: Decimal) -> NewTransaction {
        NewTransaction {
            id: TransactionId::new(),
            amount: Amount::new(amount).unwrap(),
            currency: Currency::Usd,
            description: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn completed_transfer(sender: AccountId) -> Transaction {
        Transaction::transfer(sender, AccountId::new(), new_tx(dec!(10)))
            .unwrap()
            .completed(Utc::now())
            .unwrap()
    }

    fn failed_transfer(sender: AccountId) -> Transaction {
        Transaction::transfer(sender, AccountId::new(), new_tx(dec!(10)))
            .unwrap()
            .failed(FraudReason::SystemError, Utc::now())
            .unwrap()
    }

    fn withdrawal(sender: AccountId, amount: Decimal) -> Transaction {
        Transaction::withdrawal(sender, new_tx(amount))
            .unwrap()
            .completed(Utc::now())
            .unwrap()
    }

    #[test]
    fn eleven_completed_transfers_flag_every_one() {
        let sender = AccountId::new();
        let txs: Vec<_> = (0..11).map(|_| completed_transfer(sender)).collect();

        let findings = classify(&txs, &ScanRules::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].reason, FraudReason::RateLimitExceeded);
        assert_eq!(findings[0].transaction_ids.len(), 11);
    }

    #[test]
    fn ten_completed_transfers_are_fine() {
        let sender = AccountId::new();
        let txs: Vec<_> = (0..10).map(|_| completed_transfer(sender)).collect();
        assert!(classify(&txs, &ScanRules::default()).is_empty());
    }

    #[test]
    fn rate_limit_flags_the_senders_other_records_too() {
        let sender = AccountId::new();
        let mut txs: Vec<_> = (0..11).map(|_| completed_transfer(sender)).collect();
        let small = withdrawal(sender, dec!(20));
        txs.push(small.clone());

        let findings = classify(&txs, &ScanRules::default());
        assert!(findings[0].transaction_ids.contains(&small.id));
    }

    #[test]
    fn only_large_withdrawals_are_suspicious() {
        let sender = AccountId::new();
        let at_threshold = withdrawal(sender, dec!(8000));
        let above = withdrawal(sender, dec!(8000.01));

        let findings = classify(&[at_threshold, above.clone()], &ScanRules::default());
        assert_eq!(
            findings,
            vec![ScanFinding {
                sender,
                reason: FraudReason::SuspiciousAmount,
                transaction_ids: vec![above.id],
            }]
        );
    }

    #[test]
    fn repeated_failures_flag_whole_set_last() {
        let sender = AccountId::new();
        let mut txs: Vec<_> = (0..3).map(|_| failed_transfer(sender)).collect();
        txs.push(withdrawal(sender, dec!(9500)));

        let findings = classify(&txs, &ScanRules::default());
        let reasons: Vec<_> = findings.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![FraudReason::SuspiciousAmount, FraudReason::MultipleFailedAttempts]
        );
        assert_eq!(findings[1].transaction_ids.len(), 4);
    }

    #[test]
    fn deposits_and_other_senders_are_independent() {
        let busy = AccountId::new();
        let quiet = AccountId::new();
        let mut txs: Vec<_> = (0..11).map(|_| completed_transfer(busy)).collect();
        txs.extend((0..2).map(|_| completed_transfer(quiet)));
        txs.push(
            Transaction::deposit(quiet, new_tx(dec!(9999)))
                .unwrap()
                .completed(Utc::now())
                .unwrap(),
        );

        let findings = classify(&txs, &ScanRules::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].sender, busy);
    }
}
