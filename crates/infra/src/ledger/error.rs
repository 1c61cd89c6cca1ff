use thiserror::Error;

use walletd_core::{DomainError, TransactionId};
use walletd_fraud::FraudRejection;

use crate::store::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure of a ledger operation.
///
/// Everything except `LedgerInconsistency` leaves balances exactly as they
/// were before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    FraudRejected(#[from] FraudRejection),

    #[error("Fraud detection metadata missing")]
    MissingFraudContext,

    #[error("store unavailable: {0}")]
    StoreUnavailable(StoreError),

    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// The transfer was rolled back; `source` is what made it fail.
    #[error("transfer {transaction_id} failed and was rolled back: {source}")]
    TransferFailed {
        transaction_id: TransactionId,
        source: StoreError,
    },

    /// A write needed to keep balances and records consistent did not land.
    /// Requires operator attention.
    #[error("ledger inconsistency (transaction {transaction_id:?}): {detail}")]
    LedgerInconsistency {
        transaction_id: Option<TransactionId>,
        detail: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::InsufficientBalance => "insufficient_balance",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::FraudRejected(r) => r.code(),
            LedgerError::MissingFraudContext => "fraud_context_missing",
            LedgerError::StoreUnavailable(_) => "store_unavailable",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::TransferFailed { .. } => "transfer_failed",
            LedgerError::LedgerInconsistency { .. } => "ledger_inconsistency",
            LedgerError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            other => LedgerError::StoreUnavailable(other),
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InsufficientBalance(_) => LedgerError::InsufficientBalance,
            DomainError::InvariantViolation(msg) => LedgerError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_conflict() {
        let err: LedgerError = StoreError::Conflict("stale".into()).into();
        assert_eq!(err, LedgerError::Conflict("stale".into()));

        let err: LedgerError = StoreError::Timeout("save account").into();
        assert_eq!(err.code(), "store_unavailable");
    }

    #[test]
    fn insufficient_balance_message_is_stable() {
        let err: LedgerError = DomainError::insufficient_balance("USD short").into();
        assert_eq!(err.to_string(), "Insufficient balance");
    }

    #[test]
    fn domain_errors_map_by_kind() {
        let err: LedgerError = DomainError::invalid_id("AccountId: bad").into();
        assert_eq!(err, LedgerError::Validation("AccountId: bad".into()));

        let err: LedgerError = DomainError::invariant("cannot flag a pending transaction").into();
        assert_eq!(err.code(), "internal_error");
    }
}
