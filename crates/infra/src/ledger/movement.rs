//! Single-account movements: deposit and withdrawal.

use chrono::Utc;
use tracing::{error, info, warn};

use walletd_core::{AggregateRoot, Amount, Currency, TransactionId};
use walletd_wallet::{Account, NewTransaction, Transaction};

use super::{
    Deposit, LedgerError, LedgerResult, LedgerService, MovementReceipt, WriteOutcome, Withdraw,
};
use crate::store::WalletStore;

impl<S: WalletStore> LedgerService<S> {
    pub async fn deposit(&self, cmd: Deposit) -> LedgerResult<MovementReceipt> {
        let amount = Amount::positive(cmd.amount)?;
        let fraud = cmd.fraud.ok_or(LedgerError::MissingFraudContext)?;

        let _guard = self.locks.lock(cmd.account).await;
        let before = self.load_open(cmd.account, "User not found").await?;
        let after = before.credited(cmd.currency, amount)?;

        let now = Utc::now();
        let tx = Transaction::deposit(
            cmd.account,
            NewTransaction {
                id: TransactionId::new(),
                amount,
                currency: cmd.currency,
                description: cmd.description,
                metadata: Some(fraud.into_metadata()),
                created_at: now,
            },
        )?
        .completed(now)?;

        self.settle(before, after, tx, cmd.currency).await
    }

    pub async fn withdraw(&self, cmd: Withdraw) -> LedgerResult<MovementReceipt> {
        let amount = Amount::positive(cmd.amount)?;
        let fraud = cmd.fraud.ok_or(LedgerError::MissingFraudContext)?;

        let _guard = self.locks.lock(cmd.account).await;
        let before = self.load_open(cmd.account, "User not found").await?;
        let after = before.debited(cmd.currency, amount)?;

        let now = Utc::now();
        let tx = Transaction::withdrawal(
            cmd.account,
            NewTransaction {
                id: TransactionId::new(),
                amount,
                currency: cmd.currency,
                description: cmd.description,
                metadata: Some(fraud.into_metadata()),
                created_at: now,
            },
        )?
        .completed(now)?;

        self.settle(before, after, tx, cmd.currency).await
    }

    /// Persist the new account state, then the completed record. If the
    /// record cannot be written, the account is put back.
    async fn settle(
        &self,
        before: Account,
        after: Account,
        tx: Transaction,
        currency: Currency,
    ) -> LedgerResult<MovementReceipt> {
        let applied = match self.write_account(&after, before.version()).await {
            Ok(WriteOutcome::Applied(applied)) => applied,
            Ok(WriteOutcome::NotApplied(e)) => return Err(e.into()),
            Err(e) => {
                error!(account = %before.id_typed(), tx = %tx.id, error = %e, "account write outcome unknown");
                return Err(LedgerError::LedgerInconsistency {
                    transaction_id: Some(tx.id),
                    detail: format!("account write outcome unknown: {e}"),
                });
            }
        };

        if let Err(e) = self
            .bounded("save transaction", self.store.save_transaction(&tx))
            .await
        {
            warn!(account = %before.id_typed(), tx = %tx.id, error = %e, "transaction write failed; reverting account");
            let restore = before.clone().with_version(applied.version());
            return match self.write_account(&restore, applied.version()).await {
                Ok(WriteOutcome::Applied(_)) => Err(LedgerError::StoreUnavailable(e)),
                Ok(WriteOutcome::NotApplied(revert_err)) | Err(revert_err) => {
                    error!(
                        account = %before.id_typed(),
                        tx = %tx.id,
                        error = %revert_err,
                        "failed to revert account after transaction write failure"
                    );
                    Err(LedgerError::LedgerInconsistency {
                        transaction_id: Some(tx.id),
                        detail: format!(
                            "balance changed without a record; revert failed: {revert_err}"
                        ),
                    })
                }
            };
        }

        info!(
            account = %before.id_typed(),
            tx = %tx.id,
            kind = ?tx.kind,
            amount = %tx.amount,
            currency = %currency,
            "movement completed"
        );

        Ok(MovementReceipt {
            new_balance: applied.balance(currency),
            transaction: tx,
        })
    }
}
