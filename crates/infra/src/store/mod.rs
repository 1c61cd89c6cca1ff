//! Durable store boundary for accounts and transactions.
//!
//! The store guarantees per-record atomicity only. Anything spanning more
//! than one record (a transfer touches two accounts and one transaction) is
//! coordinated by the ledger core.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryWalletStore;
pub use query::{Page, Pagination, Settlement, TransactionFilter};
pub use r#trait::{StoreError, WalletStore};
