use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use walletd_wallet::TransactionMetadata;

/// Where a request came from, as seen by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Proof that a request passed the fraud gate.
///
/// Only `gate::screen` can build one; the ledger refuses to move money
/// without it and copies its metadata onto the transaction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudContext {
    metadata: TransactionMetadata,
}

impl FraudContext {
    pub(crate) fn stamped(origin: RequestOrigin, now: DateTime<Utc>) -> Self {
        Self {
            metadata: TransactionMetadata {
                ip_address: origin.ip_address,
                user_agent: origin.user_agent,
                timestamp: now,
            },
        }
    }

    pub fn metadata(&self) -> &TransactionMetadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> TransactionMetadata {
        self.metadata
    }
}
