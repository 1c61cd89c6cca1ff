//! Fraud services: the synchronous gate and the periodic scanner.

pub mod gate;
pub mod runner;
pub mod scanner;

pub use gate::{FraudGate, GateError};
pub use runner::{
    MIN_SCAN_INTERVAL, ScanAnchor, ScanSchedule, ScannerHandle, ScannerRunner, next_midnight_after,
};
pub use scanner::{FraudScanner, ScanReport};
