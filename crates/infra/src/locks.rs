//! Per-account mutual exclusion.
//!
//! Every read-modify-write of an account runs while holding that account's
//! lock. Operations touching two accounts take both locks in ascending
//! `AccountId` order, so two opposite transfers cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use walletd_core::AccountId;

const PRUNE_ABOVE: usize = 4096;

/// Table of async mutexes keyed by account.
#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

/// Holds one or more account locks; released on drop.
#[derive(Debug)]
pub struct AccountGuard {
    held: Vec<AccountId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountGuard {
    pub fn accounts(&self) -> &[AccountId] {
        &self.held
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, account: AccountId) -> AccountGuard {
        self.lock_all(&[account]).await
    }

    /// Lock both accounts, lower id first, regardless of argument order.
    pub async fn lock_pair(&self, a: AccountId, b: AccountId) -> AccountGuard {
        self.lock_all(&[a, b]).await
    }

    pub async fn lock_all(&self, accounts: &[AccountId]) -> AccountGuard {
        let mut ordered = accounts.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let slot = self.slot(*id);
            guards.push(slot.lock_owned().await);
        }

        AccountGuard {
            held: ordered,
            _guards: guards,
        }
    }

    fn slot(&self, account: AccountId) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if table.len() > PRUNE_ABOVE {
            // Only the table holds an idle slot.
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        table.entry(account).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn pair_is_acquired_in_id_order() {
        let locks = AccountLocks::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };

        let guard = locks.lock_pair(hi, lo).await;
        assert_eq!(guard.accounts(), &[lo, hi]);
    }

    #[tokio::test]
    async fn same_account_twice_is_locked_once() {
        let locks = AccountLocks::new();
        let a = AccountId::new();
        let guard = locks.lock_pair(a, a).await;
        assert_eq!(guard.accounts(), &[a]);
    }

    #[tokio::test]
    async fn held_lock_blocks_second_holder() {
        let locks = Arc::new(AccountLocks::new());
        let a = AccountId::new();
        let guard = locks.lock(a).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(a).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn opposite_pairs_do_not_deadlock() {
        let locks = Arc::new(AccountLocks::new());
        let a = AccountId::new();
        let b = AccountId::new();

        let mut tasks = Vec::new();
        for i in 0..200 {
            let locks = locks.clone();
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            tasks.push(tokio::spawn(async move {
                let _g = locks.lock_pair(x, y).await;
                tokio::task::yield_now().await;
            }));
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            for t in tasks {
                t.await.unwrap();
            }
        })
        .await
        .expect("lock ordering should prevent deadlock");
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = AccountLocks::new();
        for _ in 0..(PRUNE_ABOVE + 2) {
            let _g = locks.lock(AccountId::new()).await;
        }
        assert!(locks.len() <= PRUNE_ABOVE + 1);
    }
}
