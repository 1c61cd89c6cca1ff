//! `walletd-fraud`: deterministic fraud rules.
//!
//! Two consumers share these rules:
//! - the synchronous gate (`gate::screen`) that runs before every movement, and
//! - the periodic scanner (`scanner::classify`) that marks settled history.
//!
//! Both are pure over a slice of transactions; loading that slice and writing
//! the results is done by `walletd-infra`.

pub mod context;
pub mod gate;
pub mod limits;
pub mod scanner;

pub use context::{FraudContext, RequestOrigin};
pub use gate::{FraudRejection, MovementRequest, check_daily_limit, screen};
pub use limits::{FraudLimits, ScanRules};
pub use scanner::{ScanFinding, classify};
