//! Query shapes shared by store implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use walletd_core::{AccountId, Currency};
use walletd_wallet::{FraudReason, Transaction, TransactionStatus, TransactionType};

/// Page-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Maximum number of items per page.
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(50).clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

/// One page of results plus the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(self.pagination.limit as u64)
    }
}

/// Final status for a PENDING transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Failed(FraudReason),
}

impl Settlement {
    pub fn status(&self) -> TransactionStatus {
        match self {
            Settlement::Completed => TransactionStatus::Completed,
            Settlement::Failed(_) => TransactionStatus::Failed,
        }
    }
}

/// Filter criteria for transaction queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Sender or receiver.
    pub involving: Option<AccountId>,
    pub sender: Option<AccountId>,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub currency: Option<Currency>,
    pub fraudulent: Option<bool>,
    /// Inclusive lower bound on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    pub include_deleted: bool,
}

impl TransactionFilter {
    pub fn involving(account: AccountId) -> Self {
        Self {
            involving: Some(account),
            ..Self::default()
        }
    }

    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if !self.include_deleted && tx.is_deleted {
            return false;
        }
        if let Some(account) = self.involving {
            if !tx.involves(account) {
                return false;
            }
        }
        if self.sender.is_some() && tx.sender != self.sender {
            return false;
        }
        if self.kind.is_some_and(|k| k != tx.kind) {
            return false;
        }
        if self.status.is_some_and(|s| s != tx.status) {
            return false;
        }
        if self.currency.is_some_and(|c| c != tx.currency) {
            return false;
        }
        if self.fraudulent.is_some_and(|f| f != tx.is_fraudulent) {
            return false;
        }
        if self.created_after.is_some_and(|at| tx.created_at < at) {
            return false;
        }
        true
    }
}
