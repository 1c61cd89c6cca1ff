//! `walletd-wallet`: wallet holder accounts and the transaction record.
//!
//! Pure domain: no IO. The ledger core in `walletd-infra` drives these types
//! and persists the values they return.

pub mod account;
pub mod transaction;

pub use account::{Account, Wallet};
pub use transaction::{
    FraudReason, NewTransaction, Transaction, TransactionMetadata, TransactionStatus,
    TransactionType,
};
