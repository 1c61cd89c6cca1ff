use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use walletd_core::{AccountId, AggregateRoot, ExpectedVersion, TransactionId};
use walletd_wallet::{Account, FraudReason, Transaction, TransactionStatus};

use super::query::{Page, Pagination, Settlement, TransactionFilter};
use super::r#trait::{StoreError, WalletStore};

/// In-memory wallet store.
///
/// Intended for tests/dev and single-process deployments. Each call takes a
/// short-lived lock over one table, which gives the per-record atomicity the
/// ledger relies on.
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    transactions: RwLock<HashMap<TransactionId, Transaction>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }

    fn newest_first(txs: &mut [Transaction]) {
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}

#[async_trait::async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| Self::poisoned())?;

        if accounts.contains_key(&account.id_typed()) {
            return Err(StoreError::Duplicate(format!("account {}", account.id_typed())));
        }
        if accounts.values().any(|a| a.email() == account.email()) {
            return Err(StoreError::Duplicate(format!("email {}", account.email())));
        }

        let stored = account.with_version(1);
        accounts.insert(stored.id_typed(), stored.clone());
        Ok(stored)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| Self::poisoned())?;
        Ok(accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = email.trim().to_lowercase();
        let accounts = self.accounts.read().map_err(|_| Self::poisoned())?;
        Ok(accounts.values().find(|a| a.email() == email).cloned())
    }

    async fn save_account(
        &self,
        account: &Account,
        expected: ExpectedVersion,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| Self::poisoned())?;

        let id = account.id_typed();
        let current = accounts
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?
            .version();

        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "account {id}: expected {expected:?}, found {current}"
            )));
        }

        let stored = account.clone().with_version(current + 1);
        accounts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| Self::poisoned())?;
        let mut all: Vec<_> = accounts.values().cloned().collect();
        all.sort_by_key(|a| a.id_typed());
        Ok(all)
    }

    async fn save_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut txs = self.transactions.write().map_err(|_| Self::poisoned())?;
        txs.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn settle_transaction(
        &self,
        id: TransactionId,
        outcome: Settlement,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        let mut txs = self.transactions.write().map_err(|_| Self::poisoned())?;
        let tx = txs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?;

        if tx.status == outcome.status() {
            return Ok(tx.clone());
        }
        let settled = match outcome {
            Settlement::Completed => tx.completed(now),
            Settlement::Failed(reason) => tx.failed(reason, now),
        }
        .map_err(|e| StoreError::Conflict(format!("transaction {id}: {e}")))?;

        *tx = settled;
        Ok(tx.clone())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let txs = self.transactions.read().map_err(|_| Self::poisoned())?;
        Ok(txs.get(&id).cloned())
    }

    async fn find_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let txs = self.transactions.read().map_err(|_| Self::poisoned())?;
        let mut found: Vec<_> = txs.values().filter(|tx| filter.matches(tx)).cloned().collect();
        Self::newest_first(&mut found);
        Ok(found)
    }

    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<Transaction>, StoreError> {
        let all = self.find_transactions(filter).await?;
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            pagination,
        })
    }

    async fn flag_transactions(
        &self,
        ids: &[TransactionId],
        reason: FraudReason,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut txs = self.transactions.write().map_err(|_| Self::poisoned())?;

        let mut updated = 0;
        for id in ids {
            let Some(tx) = txs.get_mut(id) else {
                continue;
            };
            if tx.status == TransactionStatus::Pending {
                continue;
            }
            if let Ok(flagged) = tx.flagged(reason, now) {
                *tx = flagged;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn soft_delete_transaction(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        let mut txs = self.transactions.write().map_err(|_| Self::poisoned())?;
        let tx = txs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?;
        *tx = tx.soft_deleted(now);
        Ok(tx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use walletd_core::{Amount, Currency};
    use walletd_wallet::NewTransaction;

    fn account(email: &str) -> Account {
        Account::open(AccountId::new(), "someone", email, Utc::now()).unwrap()
    }

    fn deposit(receiver: AccountId, at: DateTime<Utc>) -> Transaction {
        Transaction::deposit(
            receiver,
            NewTransaction {
                id: TransactionId::new(),
                amount: Amount::new(dec!(10)).unwrap(),
                currency: Currency::Usd,
                description: None,
                metadata: None,
                created_at: at,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = InMemoryWalletStore::new();
        store.insert_account(account("a@example.com")).await.unwrap();
        let err = store.insert_account(account("A@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn save_account_is_conditional() {
        let store = InMemoryWalletStore::new();
        let stored = store.insert_account(account("a@example.com")).await.unwrap();
        assert_eq!(stored.version(), 1);

        let next = stored.credited(Currency::Usd, Amount::new(dec!(5)).unwrap()).unwrap();
        let saved = store
            .save_account(&next, ExpectedVersion::Exact(1))
            .await
            .unwrap();
        assert_eq!(saved.version(), 2);

        let err = store
            .save_account(&next, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn flagging_skips_pending_records() {
        let store = InMemoryWalletStore::new();
        let who = AccountId::new();
        let pending = deposit(who, Utc::now());
        let done = deposit(who, Utc::now()).completed(Utc::now()).unwrap();
        store.save_transaction(&pending).await.unwrap();
        store.save_transaction(&done).await.unwrap();

        let n = store
            .flag_transactions(&[pending.id, done.id], FraudReason::UnusualPattern, Utc::now())
            .await
            .unwrap();
        assert_eq!(n, 1);

        let pending = store.get_transaction(pending.id).await.unwrap().unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending);
        let done = store.get_transaction(done.id).await.unwrap().unwrap();
        assert_eq!(done.status, TransactionStatus::Flagged);
    }

    #[tokio::test]
    async fn settlement_keeps_soft_delete_and_is_repeatable() {
        let store = InMemoryWalletStore::new();
        let tx = deposit(AccountId::new(), Utc::now());
        store.save_transaction(&tx).await.unwrap();
        store.soft_delete_transaction(tx.id, Utc::now()).await.unwrap();

        let settled = store
            .settle_transaction(tx.id, Settlement::Completed, Utc::now())
            .await
            .unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert!(settled.is_deleted);

        let again = store
            .settle_transaction(tx.id, Settlement::Completed, Utc::now())
            .await
            .unwrap();
        assert_eq!(again, settled);

        let err = store
            .settle_transaction(tx.id, Settlement::Failed(FraudReason::SystemError), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .settle_transaction(TransactionId::new(), Settlement::Completed, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn queries_are_newest_first_and_skip_deleted() {
        let store = InMemoryWalletStore::new();
        let who = AccountId::new();
        let now = Utc::now();
        let old = deposit(who, now - Duration::hours(2));
        let new = deposit(who, now);
        let gone = deposit(who, now - Duration::hours(1));
        for tx in [&old, &new, &gone] {
            store.save_transaction(tx).await.unwrap();
        }
        store.soft_delete_transaction(gone.id, now).await.unwrap();

        let page = store
            .query_transactions(&TransactionFilter::involving(who), Pagination::new(None, Some(1)))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, new.id);

        let window = store
            .transactions_involving(who, now - Duration::minutes(90))
            .await
            .unwrap();
        assert_eq!(window.len(), 2, "rolling window includes deleted records");
    }
}
