use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use walletd_core::{AccountId, AggregateRoot, Amount, Currency, DomainError, DomainResult};

/// One currency balance held by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub currency: Currency,
    pub balance: Amount,
}

/// Aggregate root: a wallet holder.
///
/// Every state transition returns a new `Account`; callers persist it with a
/// single conditional write against `version()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    username: String,
    email: String,
    wallets: BTreeMap<Currency, Wallet>,
    daily_transfer_amount: Amount,
    last_transfer_reset: DateTime<Utc>,
    is_active: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    version: u64,
}

impl Account {
    /// A fresh, active account holding no wallets.
    pub fn open(
        id: AccountId,
        username: impl Into<String>,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let username = username.into().trim().to_string();
        let email = email.into().trim().to_lowercase();
        if username.is_empty() {
            return Err(DomainError::validation("username is required"));
        }
        if !email.contains('@') {
            return Err(DomainError::validation("email is invalid"));
        }

        Ok(Self {
            id,
            username,
            email,
            wallets: BTreeMap::new(),
            daily_transfer_amount: Amount::ZERO,
            last_transfer_reset: now,
            is_active: true,
            is_deleted: false,
            created_at: now,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn daily_transfer_amount(&self) -> Amount {
        self.daily_transfer_amount
    }

    pub fn last_transfer_reset(&self) -> DateTime<Utc> {
        self.last_transfer_reset
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Active and not soft-deleted.
    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn wallet(&self, currency: Currency) -> Option<&Wallet> {
        self.wallets.get(&currency)
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    /// Balance in `currency`; zero when no wallet exists. Never creates one.
    pub fn balance(&self, currency: Currency) -> Amount {
        self.wallets
            .get(&currency)
            .map(|w| w.balance)
            .unwrap_or(Amount::ZERO)
    }

    /// Stamp the version the store persisted this value at.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Credit `amount`, creating the wallet on first use.
    pub fn credited(&self, currency: Currency, amount: Amount) -> DomainResult<Self> {
        let balance = self
            .balance(currency)
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("balance overflow"))?;
        Ok(self.with_balance(currency, balance))
    }

    /// Debit `amount`; the wallet must exist and hold at least `amount`.
    pub fn debited(&self, currency: Currency, amount: Amount) -> DomainResult<Self> {
        let wallet = self.wallets.get(&currency).ok_or_else(|| {
            DomainError::insufficient_balance(format!("no {currency} wallet"))
        })?;
        let balance = wallet.balance.checked_sub(amount).ok_or_else(|| {
            DomainError::insufficient_balance(format!(
                "{currency} balance {} is below {amount}",
                wallet.balance
            ))
        })?;
        Ok(self.with_balance(currency, balance))
    }

    /// Reset the daily transfer counter when `now` is on a later UTC day than
    /// the last reset.
    pub fn rolled_over(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if now.date_naive() > self.last_transfer_reset.date_naive() {
            next.daily_transfer_amount = Amount::ZERO;
            next.last_transfer_reset = now;
        }
        next
    }

    /// Sender side of a transfer: roll the daily counter over, debit, and
    /// count `amount` against today's transfers.
    pub fn with_transfer_debit(
        &self,
        currency: Currency,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut next = self.rolled_over(now).debited(currency, amount)?;
        next.daily_transfer_amount = next
            .daily_transfer_amount
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("daily transfer counter overflow"))?;
        Ok(next)
    }

    /// Undo `with_transfer_debit`: re-credit and restore the daily counter
    /// fields from `before`, the snapshot taken prior to the debit.
    pub fn with_transfer_reversal(
        &self,
        currency: Currency,
        amount: Amount,
        before: &Account,
    ) -> DomainResult<Self> {
        if before.id != self.id {
            return Err(DomainError::invariant("reversal snapshot belongs to another account"));
        }
        let mut next = self.credited(currency, amount)?;
        next.daily_transfer_amount = before.daily_transfer_amount;
        next.last_transfer_reset = before.last_transfer_reset;
        Ok(next)
    }

    /// Soft delete: the account keeps its history but can no longer transact.
    pub fn closed(&self) -> Self {
        let mut next = self.clone();
        next.is_deleted = true;
        next.is_active = false;
        next
    }

    fn with_balance(&self, currency: Currency, balance: Amount) -> Self {
        let mut next = self.clone();
        next.wallets.insert(currency, Wallet { currency, balance });
        next
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn account() -> Account {
        Account::open(AccountId::new(), "alice", "Alice@Example.com", t0()).unwrap()
    }

    fn amt(v: Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    #[test]
    fn open_normalizes_email_and_starts_empty() {
        let a = account();
        assert_eq!(a.email(), "alice@example.com");
        assert!(a.is_open());
        assert_eq!(a.wallets().count(), 0);
        assert_eq!(a.balance(Currency::Usd), Amount::ZERO);
    }

    #[test]
    fn balance_read_does_not_create_wallet() {
        let a = account();
        let _ = a.balance(Currency::Eur);
        assert!(a.wallet(Currency::Eur).is_none());
    }

    #[test]
    fn credit_creates_wallet_lazily() {
        let a = account().credited(Currency::Eur, amt(dec!(25))).unwrap();
        assert_eq!(a.balance(Currency::Eur), amt(dec!(25)));
        assert_eq!(a.wallets().count(), 1);
    }

    #[test]
    fn debit_without_wallet_is_insufficient_balance() {
        let err = account().debited(Currency::Gbp, amt(dec!(1))).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientBalance(_)));
    }

    #[test]
    fn debit_leaves_original_value_untouched() {
        let a = account().credited(Currency::Usd, amt(dec!(100))).unwrap();
        let b = a.debited(Currency::Usd, amt(dec!(40))).unwrap();
        assert_eq!(a.balance(Currency::Usd), amt(dec!(100)));
        assert_eq!(b.balance(Currency::Usd), amt(dec!(60)));
    }

    #[test]
    fn transfer_debit_counts_against_daily_total_and_rolls_over() {
        let a = account().credited(Currency::Usd, amt(dec!(100))).unwrap();
        let a = a.with_transfer_debit(Currency::Usd, amt(dec!(30)), t0()).unwrap();
        assert_eq!(a.daily_transfer_amount(), amt(dec!(30)));

        let next_day = t0() + Duration::days(1);
        let a = a.with_transfer_debit(Currency::Usd, amt(dec!(5)), next_day).unwrap();
        assert_eq!(a.daily_transfer_amount(), amt(dec!(5)));
        assert_eq!(a.last_transfer_reset(), next_day);
    }

    #[test]
    fn reversal_restores_balance_and_counter() {
        let before = account().credited(Currency::Usd, amt(dec!(100))).unwrap();
        let debited = before
            .with_transfer_debit(Currency::Usd, amt(dec!(100)), t0() + Duration::days(2))
            .unwrap();
        let restored = debited
            .with_transfer_reversal(Currency::Usd, amt(dec!(100)), &before)
            .unwrap();

        assert_eq!(restored.balance(Currency::Usd), before.balance(Currency::Usd));
        assert_eq!(restored.daily_transfer_amount(), before.daily_transfer_amount());
        assert_eq!(restored.last_transfer_reset(), before.last_transfer_reset());
    }

    #[test]
    fn closed_account_is_not_open() {
        let a = account().closed();
        assert!(a.is_deleted());
        assert!(!a.is_active());
        assert!(!a.is_open());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Credit(u8, i64),
        Debit(u8, i64),
        Transfer(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 1i64..100_000).prop_map(|(c, a)| Op::Credit(c, a)),
            (0u8..4, 1i64..100_000).prop_map(|(c, a)| Op::Debit(c, a)),
            (1i64..100_000).prop_map(Op::Transfer),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of movements is attempted, balances
        /// never go negative and the total held equals credits minus the
        /// debits that were accepted.
        #[test]
        fn balances_stay_non_negative_and_conserved(ops in prop::collection::vec(op(), 1..60)) {
            let mut a = account();
            let mut b = Account::open(AccountId::new(), "bob", "bob@example.com", t0()).unwrap();
            let mut expected_total = Decimal::ZERO;

            for op in ops {
                match op {
                    Op::Credit(c, cents) => {
                        let amount = amt(Decimal::new(cents, 2));
                        a = a.credited(Currency::ALL[c as usize], amount).unwrap();
                        expected_total += amount.value();
                    }
                    Op::Debit(c, cents) => {
                        let amount = amt(Decimal::new(cents, 2));
                        if let Ok(next) = a.debited(Currency::ALL[c as usize], amount) {
                            a = next;
                            expected_total -= amount.value();
                        }
                    }
                    Op::Transfer(cents) => {
                        let amount = amt(Decimal::new(cents, 2));
                        if let Ok(next) = a.with_transfer_debit(Currency::Usd, amount, t0()) {
                            a = next;
                            b = b.credited(Currency::Usd, amount).unwrap();
                        }
                    }
                }

                for w in a.wallets().chain(b.wallets()) {
                    prop_assert!(w.balance.value() >= Decimal::ZERO);
                }
            }

            let total: Decimal = a
                .wallets()
                .chain(b.wallets())
                .map(|w| w.balance.value())
                .sum();
            prop_assert_eq!(total, expected_total);
        }
    }
}
