use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use walletd_core::{AccountId, ExpectedVersion, TransactionId};
use walletd_wallet::{Account, FraudReason, Transaction};

use super::query::{Page, Pagination, Settlement, TransactionFilter};

/// Store operation error.
///
/// These are infrastructure failures, as opposed to domain errors
/// (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out: {0}")]
    Timeout(&'static str),

    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Durable storage for accounts and transactions.
#[async_trait::async_trait]
pub trait WalletStore: Send + Sync {
    /// Stores a new account at version 1. Ids and emails are unique.
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Conditional write: fails with `Conflict` unless the stored version
    /// matches `expected`. Returns the stored value at its new version.
    async fn save_account(
        &self,
        account: &Account,
        expected: ExpectedVersion,
    ) -> Result<Account, StoreError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Insert or replace a whole transaction record.
    async fn save_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Status-only write moving a PENDING record to `outcome`. Every other
    /// stored field, `is_deleted` included, is kept. Repeating a settlement
    /// that already landed returns the stored record; any other non-PENDING
    /// status is a `Conflict`.
    async fn settle_transaction(
        &self,
        id: TransactionId,
        outcome: Settlement,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Newest first.
    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<Transaction>, StoreError>;

    /// Bulk fraud mark. Records still `PENDING` belong to an in-flight
    /// movement and are skipped. Returns how many records were updated.
    async fn flag_transactions(
        &self,
        ids: &[TransactionId],
        reason: FraudReason,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    async fn soft_delete_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError>;

    /// Everything the account took part in since `since`, soft-deleted
    /// records included.
    async fn transactions_involving(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let filter = TransactionFilter::involving(account).since(since).with_deleted();
        self.find_transactions(&filter).await
    }

    /// Non-deleted records created since `since`.
    async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let filter = TransactionFilter::default().since(since);
        self.find_transactions(&filter).await
    }
}

#[async_trait::async_trait]
impl<S> WalletStore for Arc<S>
where
    S: WalletStore + ?Sized,
{
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        (**self).insert_account(account).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).get_account(id).await
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_account_by_email(email).await
    }

    async fn save_account(
        &self,
        account: &Account,
        expected: ExpectedVersion,
    ) -> Result<Account, StoreError> {
        (**self).save_account(account, expected).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        (**self).list_accounts().await
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        (**self).save_transaction(tx).await
    }

    async fn settle_transaction(
        &self,
        id: TransactionId,
        outcome: Settlement,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        (**self).settle_transaction(id, outcome, now).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        (**self).get_transaction(id).await
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).find_transactions(filter).await
    }

    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<Transaction>, StoreError> {
        (**self).query_transactions(filter, pagination).await
    }

    async fn flag_transactions(
        &self,
        ids: &[TransactionId],
        reason: FraudReason,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        (**self).flag_transactions(ids, reason, now).await
    }

    async fn soft_delete_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        (**self).soft_delete_transaction(id, now).await
    }

    async fn transactions_involving(
        &self,
        account: AccountId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).transactions_involving(account, since).await
    }

    async fn recent_transactions(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).recent_transactions(since).await
    }
}
