//! Operator reports over accounts and transactions.
//!
//! Read-only aggregation, in the manner of a projection computed on demand.
//! Account soft-delete goes through `LedgerService::close_account` because it
//! is an account write.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use walletd_core::{AccountId, Currency, TransactionId};
use walletd_wallet::{Transaction, TransactionStatus};

use crate::store::{Page, Pagination, StoreError, TransactionFilter, WalletStore};

const MAX_TOP_LIMIT: usize = 100;

/// One row of a "top accounts" report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountStanding {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    pub amount: Decimal,
    /// Number of transactions behind `amount` (volume reports only).
    pub transaction_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AdminReports<S> {
    store: S,
    store_timeout: Duration,
}

impl<S: WalletStore> AdminReports<S> {
    pub fn new(store: S, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(what))?
    }

    /// Fraud-marked, non-deleted transactions, newest first.
    pub async fn flagged_transactions(
        &self,
        pagination: Pagination,
    ) -> Result<Page<Transaction>, StoreError> {
        let filter = TransactionFilter {
            fraudulent: Some(true),
            ..TransactionFilter::default()
        };
        self.bounded("query transactions", self.store.query_transactions(&filter, pagination))
            .await
    }

    /// Sum of every non-deleted account's balance, per supported currency.
    pub async fn total_balances(&self) -> Result<BTreeMap<Currency, Decimal>, StoreError> {
        let mut totals: BTreeMap<Currency, Decimal> =
            Currency::ALL.iter().map(|c| (*c, Decimal::ZERO)).collect();

        let accounts = self.bounded("list accounts", self.store.list_accounts()).await?;
        for account in accounts.iter().filter(|a| !a.is_deleted()) {
            for wallet in account.wallets() {
                *totals.entry(wallet.currency).or_default() += wallet.balance.value();
            }
        }
        Ok(totals)
    }

    /// Non-deleted accounts holding `currency`, richest first.
    pub async fn top_by_balance(
        &self,
        currency: Currency,
        limit: usize,
    ) -> Result<Vec<AccountStanding>, StoreError> {
        let accounts = self.bounded("list accounts", self.store.list_accounts()).await?;

        let mut rows: Vec<AccountStanding> = accounts
            .iter()
            .filter(|a| !a.is_deleted())
            .filter_map(|a| {
                a.wallet(currency).map(|w| AccountStanding {
                    account_id: a.id_typed(),
                    username: a.username().to_string(),
                    email: a.email().to_string(),
                    amount: w.balance.value(),
                    transaction_count: None,
                })
            })
            .collect();

        rows.sort_by(|x, y| y.amount.cmp(&x.amount).then(x.account_id.cmp(&y.account_id)));
        rows.truncate(limit.clamp(1, MAX_TOP_LIMIT));
        Ok(rows)
    }

    /// Senders ranked by completed, non-deleted outgoing volume in `currency`.
    pub async fn top_by_volume(
        &self,
        currency: Currency,
        limit: usize,
    ) -> Result<Vec<AccountStanding>, StoreError> {
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Completed),
            currency: Some(currency),
            ..TransactionFilter::default()
        };
        let txs = self
            .bounded("find transactions", self.store.find_transactions(&filter))
            .await?;

        let mut volume: HashMap<AccountId, (Decimal, usize)> = HashMap::new();
        for tx in &txs {
            if let Some(sender) = tx.sender {
                let entry = volume.entry(sender).or_insert((Decimal::ZERO, 0));
                entry.0 += tx.amount.value();
                entry.1 += 1;
            }
        }

        let mut rows = Vec::with_capacity(volume.len());
        for (account_id, (amount, count)) in volume {
            let Some(account) = self
                .bounded("get account", self.store.get_account(account_id))
                .await?
            else {
                continue;
            };
            rows.push(AccountStanding {
                account_id,
                username: account.username().to_string(),
                email: account.email().to_string(),
                amount,
                transaction_count: Some(count),
            });
        }

        rows.sort_by(|x, y| y.amount.cmp(&x.amount).then(x.account_id.cmp(&y.account_id)));
        rows.truncate(limit.clamp(1, MAX_TOP_LIMIT));
        Ok(rows)
    }

    pub async fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, StoreError> {
        self.bounded(
            "soft delete transaction",
            self.store.soft_delete_transaction(id, Utc::now()),
        )
        .await
    }
}
