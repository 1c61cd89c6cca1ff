//! Ledger core: the only writer of account balances.
//!
//! Every operation runs under the per-account lock(s) it touches and
//! persists each account change with one conditional write. Store calls are
//! bounded by `LedgerSettings::store_timeout`.

mod error;
mod movement;
mod transfer;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use walletd_core::{AccountId, AggregateRoot, Amount, Currency, ExpectedVersion};
use walletd_fraud::{FraudContext, FraudLimits};
use walletd_wallet::{Account, Transaction, Wallet};

use crate::locks::AccountLocks;
use crate::store::{Page, Pagination, StoreError, TransactionFilter, WalletStore};

pub use error::{LedgerError, LedgerResult};
pub use transfer::TransferStage;

/// Timing knobs for store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    pub store_timeout: Duration,
    /// Attempts for writes that must land once money has moved.
    pub write_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            write_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deposit {
    pub account: AccountId,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: Option<String>,
    pub fraud: Option<FraudContext>,
}

#[derive(Debug, Clone)]
pub struct Withdraw {
    pub account: AccountId,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: Option<String>,
    pub fraud: Option<FraudContext>,
}

/// How the caller names the receiving account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverRef {
    Id(AccountId),
    Email(String),
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub sender: AccountId,
    pub receiver: ReceiverRef,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: Option<String>,
    pub fraud: Option<FraudContext>,
}

/// Result of a successful movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub transaction: Transaction,
    /// The caller's balance in the moved currency afterwards.
    pub new_balance: Amount,
}

/// Outcome of a conditional account write whose result may be ambiguous.
enum WriteOutcome {
    Applied(Account),
    NotApplied(StoreError),
}

pub struct LedgerService<S> {
    store: S,
    locks: Arc<AccountLocks>,
    limits: FraudLimits,
    settings: LedgerSettings,
}

impl<S: Clone> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            limits: self.limits.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: WalletStore> LedgerService<S> {
    pub fn new(store: S, limits: FraudLimits, settings: LedgerSettings) -> Self {
        Self {
            store,
            locks: Arc::new(AccountLocks::new()),
            limits,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> &FraudLimits {
        &self.limits
    }

    pub async fn open_account(&self, username: &str, email: &str) -> LedgerResult<Account> {
        let account = Account::open(AccountId::new(), username, email, Utc::now())?;
        let stored = self
            .bounded("insert account", self.store.insert_account(account))
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(what) => {
                    LedgerError::Validation(format!("account already exists: {what}"))
                }
                other => other.into(),
            })?;
        info!(account = %stored.id_typed(), "account opened");
        Ok(stored)
    }

    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.bounded("get account", self.store.get_account(id))
            .await?
            .ok_or_else(|| LedgerError::NotFound("User not found".to_string()))
    }

    /// Balance in `currency`; zero when the account holds no such wallet.
    pub async fn balance(&self, account: AccountId, currency: Currency) -> LedgerResult<Amount> {
        Ok(self.get_account(account).await?.balance(currency))
    }

    pub async fn balances(&self, account: AccountId) -> LedgerResult<Vec<Wallet>> {
        Ok(self.get_account(account).await?.wallets().copied().collect())
    }

    /// Non-deleted transactions the account took part in, newest first.
    pub async fn history(
        &self,
        account: AccountId,
        pagination: Pagination,
    ) -> LedgerResult<Page<Transaction>> {
        let filter = TransactionFilter::involving(account);
        Ok(self
            .bounded("query transactions", self.store.query_transactions(&filter, pagination))
            .await?)
    }

    /// Soft delete: the account stops transacting but keeps its history.
    pub async fn close_account(&self, account: AccountId) -> LedgerResult<Account> {
        let _guard = self.locks.lock(account).await;
        let current = self.get_account(account).await?;
        if current.is_deleted() {
            return Ok(current);
        }
        let closed = self
            .bounded(
                "save account",
                self.store
                    .save_account(&current.closed(), ExpectedVersion::Exact(current.version())),
            )
            .await?;
        info!(account = %account, "account closed");
        Ok(closed)
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(what)),
        }
    }

    /// Load an account that may transact; closed accounts read as missing.
    async fn load_open(&self, id: AccountId, missing: &str) -> LedgerResult<Account> {
        match self.bounded("get account", self.store.get_account(id)).await? {
            Some(account) if account.is_open() => Ok(account),
            _ => Err(LedgerError::NotFound(missing.to_string())),
        }
    }

    /// Conditional write of `next` over `version`.
    ///
    /// A timed-out write is resolved by re-reading the account: the caller
    /// holds its lock, so a version bump can only be this write landing.
    /// `Err` means the outcome could not be determined.
    async fn write_account(&self, next: &Account, version: u64) -> Result<WriteOutcome, StoreError> {
        let id = next.id_typed();
        let attempt = self
            .bounded(
                "save account",
                self.store.save_account(next, ExpectedVersion::Exact(version)),
            )
            .await;

        match attempt {
            Ok(stored) => Ok(WriteOutcome::Applied(stored)),
            Err(StoreError::Timeout(what)) => {
                match self.bounded("get account", self.store.get_account(id)).await? {
                    Some(current) if current.version() == version + 1 => {
                        Ok(WriteOutcome::Applied(current))
                    }
                    _ => Ok(WriteOutcome::NotApplied(StoreError::Timeout(what))),
                }
            }
            Err(other) => Ok(WriteOutcome::NotApplied(other)),
        }
    }
}
