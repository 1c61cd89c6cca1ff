//! Infrastructure layer: storage, locking, the ledger core, fraud services,
//! and configuration.

pub mod admin;
pub mod config;
pub mod fraud;
pub mod ledger;
pub mod locks;
pub mod retry;
pub mod store;


pub use admin::{AccountStanding, AdminReports};
pub use config::{ConfigError, WalletConfig};
pub use fraud::{FraudGate, FraudScanner, GateError, ScanReport, ScannerHandle, ScannerRunner};
pub use ledger::{
    Deposit, LedgerError, LedgerResult, LedgerService, LedgerSettings, MovementReceipt,
    ReceiverRef, Transfer, Withdraw,
};
pub use locks::AccountLocks;
pub use store::{
    InMemoryWalletStore, Page, Pagination, Settlement, StoreError, TransactionFilter, WalletStore,
};
