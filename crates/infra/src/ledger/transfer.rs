//! Transfer saga.
//!
//! Steps, all under both account locks:
//! 1. debit the sender (and count the amount against today's transfers)
//! 2. record the transfer as PENDING
//! 3. credit the receiver
//! 4. mark the record COMPLETED
//!
//! Compensating action: if step 2 or 3 fails, re-credit the sender, restore
//! its daily counter, and mark the record FAILED with `SYSTEM_ERROR`.
//!
//! Step 4 and the FAILED mark change only the record's status.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use walletd_core::{AccountId, AggregateRoot, Amount, Currency, TransactionId};
use walletd_fraud::check_daily_limit;
use walletd_wallet::{Account, FraudReason, NewTransaction, Transaction};

use super::{
    LedgerError, LedgerResult, LedgerService, MovementReceipt, ReceiverRef, Transfer,
    WriteOutcome,
};
use crate::retry::with_retries;
use crate::store::{Settlement, StoreError, WalletStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Validated,
    SenderDebited,
    IntentRecorded,
    ReceiverCredited,
    Completed,
    Compensated,
    Inconsistent,
}

const PARTY_MISSING: &str = "Sender or receiver not found";

struct TransferSaga<'a, S> {
    ledger: &'a LedgerService<S>,
    stage: TransferStage,
    tx: Transaction,
    currency: Currency,
    amount: Amount,
    sender_before: Account,
    receiver_before: Account,
}

impl<S: WalletStore> LedgerService<S> {
    pub async fn transfer(&self, cmd: Transfer) -> LedgerResult<MovementReceipt> {
        let amount = Amount::positive(cmd.amount)?;
        let fraud = cmd.fraud.ok_or(LedgerError::MissingFraudContext)?;

        let receiver = self.resolve_receiver(&cmd.receiver).await?;
        if receiver == cmd.sender {
            return Err(LedgerError::Validation("Cannot transfer to yourself".to_string()));
        }

        let _guard = self.locks.lock_pair(cmd.sender, receiver).await;

        let sender_before = self.load_open(cmd.sender, PARTY_MISSING).await?;
        let receiver_before = self.load_open(receiver, PARTY_MISSING).await?;

        if sender_before.balance(cmd.currency) < amount {
            return Err(LedgerError::InsufficientBalance);
        }

        // The gate checked the daily limit before the lock was taken; check
        // again against history that can no longer change under us.
        let now = Utc::now();
        let history = self
            .bounded(
                "load transaction window",
                self.store
                    .transactions_involving(cmd.sender, self.limits.window_start(now)),
            )
            .await?;
        check_daily_limit(&history, amount.value(), &self.limits, now)?;

        let tx = Transaction::transfer(
            cmd.sender,
            receiver,
            NewTransaction {
                id: TransactionId::new(),
                amount,
                currency: cmd.currency,
                description: cmd.description,
                metadata: Some(fraud.into_metadata()),
                created_at: now,
            },
        )?;

        TransferSaga {
            ledger: self,
            stage: TransferStage::Validated,
            tx,
            currency: cmd.currency,
            amount,
            sender_before,
            receiver_before,
        }
        .run(now)
        .await
    }

    async fn resolve_receiver(&self, receiver: &ReceiverRef) -> LedgerResult<AccountId> {
        let found = match receiver {
            ReceiverRef::Id(id) => self.bounded("get account", self.store.get_account(*id)).await?,
            ReceiverRef::Email(email) => {
                self.bounded("find account", self.store.find_account_by_email(email))
                    .await?
            }
        };
        match found {
            Some(account) if account.is_open() => Ok(account.id_typed()),
            _ => Err(LedgerError::NotFound(PARTY_MISSING.to_string())),
        }
    }
}

impl<S: WalletStore> TransferSaga<'_, S> {
    async fn run(mut self, now: DateTime<Utc>) -> LedgerResult<MovementReceipt> {
        let debit = self
            .sender_before
            .with_transfer_debit(self.currency, self.amount, now)?;

        let sender_after = match self
            .ledger
            .write_account(&debit, self.sender_before.version())
            .await
        {
            Ok(WriteOutcome::Applied(account)) => account,
            // Nothing has moved yet.
            Ok(WriteOutcome::NotApplied(e)) => return Err(e.into()),
            Err(e) => {
                return Err(self.inconsistent(format!("sender debit outcome unknown: {e}")));
            }
        };
        self.advance(TransferStage::SenderDebited);

        if let Err(e) = self
            .ledger
            .bounded("save transaction", self.ledger.store.save_transaction(&self.tx))
            .await
        {
            return self.compensate(sender_after, e).await;
        }
        self.advance(TransferStage::IntentRecorded);

        let credit = match self.receiver_before.credited(self.currency, self.amount) {
            Ok(credit) => credit,
            Err(e) => {
                return self
                    .compensate(sender_after, StoreError::Unavailable(e.to_string()))
                    .await;
            }
        };
        match self
            .ledger
            .write_account(&credit, self.receiver_before.version())
            .await
        {
            Ok(WriteOutcome::Applied(_)) => {}
            Ok(WriteOutcome::NotApplied(e)) => return self.compensate(sender_after, e).await,
            Err(e) => {
                return Err(self.inconsistent(format!(
                    "sender debited; receiver credit outcome unknown: {e}"
                )));
            }
        }
        self.advance(TransferStage::ReceiverCredited);

        match self.record_outcome(Settlement::Completed).await {
            Ok(stored) => self.tx = stored,
            Err(e) => {
                return Err(self.inconsistent(format!(
                    "funds moved but the record could not be marked completed: {e}"
                )));
            }
        }
        self.advance(TransferStage::Completed);

        info!(
            tx = %self.tx.id,
            sender = ?self.tx.sender,
            receiver = ?self.tx.receiver,
            amount = %self.amount,
            currency = %self.currency,
            "transfer completed"
        );

        Ok(MovementReceipt {
            new_balance: sender_after.balance(self.currency),
            transaction: self.tx,
        })
    }

    async fn compensate(
        mut self,
        sender_after: Account,
        cause: StoreError,
    ) -> LedgerResult<MovementReceipt> {
        warn!(
            tx = %self.tx.id,
            stage = ?self.stage,
            error = %cause,
            "transfer failed after sender debit; compensating"
        );

        let reversal = match sender_after.with_transfer_reversal(
            self.currency,
            self.amount,
            &self.sender_before,
        ) {
            Ok(reversal) => reversal,
            Err(e) => return Err(self.inconsistent(format!("cannot build sender reversal: {e}"))),
        };

        let ledger = self.ledger;
        let version = sender_after.version();
        let reversal = &reversal;
        let restored = with_retries(
            "restore sender",
            ledger.settings.write_retries,
            ledger.settings.retry_backoff,
            move || async move {
                match ledger.write_account(&reversal, version).await? {
                    WriteOutcome::Applied(account) => Ok(account),
                    WriteOutcome::NotApplied(e) => Err(e),
                }
            },
        )
        .await;
        if let Err(e) = restored {
            return Err(self.inconsistent(format!("sender debited but not restored: {e}")));
        }

        match self.record_outcome(Settlement::Failed(FraudReason::SystemError)).await {
            Ok(stored) => self.tx = stored,
            Err(e) => {
                return Err(self.inconsistent(format!(
                    "sender restored but the record could not be marked failed: {e}"
                )));
            }
        }
        self.advance(TransferStage::Compensated);

        Err(LedgerError::TransferFailed {
            transaction_id: self.tx.id,
            source: cause,
        })
    }

    /// Status-only write of the final outcome, so fields changed by others
    /// while the saga ran (a soft delete) survive. A record whose intent
    /// write never landed is inserted whole.
    async fn record_outcome(&self, outcome: Settlement) -> Result<Transaction, StoreError> {
        let ledger = self.ledger;
        let pending = &self.tx;
        with_retries(
            "settle transaction",
            ledger.settings.write_retries,
            ledger.settings.retry_backoff,
            move || async move {
                let now = Utc::now();
                match ledger
                    .bounded(
                        "settle transaction",
                        ledger.store.settle_transaction(pending.id, outcome, now),
                    )
                    .await
                {
                    Err(StoreError::NotFound(_)) => {
                        let whole = match outcome {
                            Settlement::Completed => pending.completed(now),
                            Settlement::Failed(reason) => pending.failed(reason, now),
                        }
                        .map_err(|e| StoreError::Conflict(e.to_string()))?;
                        ledger
                            .bounded("save transaction", ledger.store.save_transaction(&whole))
                            .await?;
                        Ok(whole)
                    }
                    other => other,
                }
            },
        )
        .await
    }

    fn advance(&mut self, stage: TransferStage) {
        tracing::debug!(tx = %self.tx.id, from = ?self.stage, to = ?stage, "transfer stage");
        self.stage = stage;
    }

    fn inconsistent(&mut self, detail: String) -> LedgerError {
        error!(
            tx = %self.tx.id,
            stage = ?self.stage,
            sender = ?self.tx.sender,
            receiver = ?self.tx.receiver,
            amount = %self.amount,
            currency = %self.currency,
            detail = %detail,
            "LEDGER INCONSISTENCY: manual reconciliation required"
        );
        self.stage = TransferStage::Inconsistent;
        LedgerError::LedgerInconsistency {
            transaction_id: Some(self.tx.id),
            detail,
        }
    }
}
