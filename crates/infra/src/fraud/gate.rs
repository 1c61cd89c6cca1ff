use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use walletd_core::AccountId;
use walletd_fraud::{FraudContext, FraudLimits, FraudRejection, MovementRequest, RequestOrigin};

use crate::store::{StoreError, WalletStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error(transparent)]
    Rejected(#[from] FraudRejection),

    #[error("fraud check could not load history: {0}")]
    Store(#[from] StoreError),
}

/// Pre-movement fraud check. Reads history; never writes.
#[derive(Debug, Clone)]
pub struct FraudGate<S> {
    store: S,
    limits: FraudLimits,
    store_timeout: Duration,
}

impl<S: WalletStore> FraudGate<S> {
    pub fn new(store: S, limits: FraudLimits, store_timeout: Duration) -> Self {
        Self {
            store,
            limits,
            store_timeout,
        }
    }

    pub fn limits(&self) -> &FraudLimits {
        &self.limits
    }

    /// Screen a request from `account`. On success the returned context must
    /// be handed to the ledger with the movement.
    pub async fn screen(
        &self,
        account: AccountId,
        request: MovementRequest,
        origin: RequestOrigin,
    ) -> Result<FraudContext, GateError> {
        let now = Utc::now();
        let since = self.limits.window_start(now);

        let history = tokio::time::timeout(
            self.store_timeout,
            self.store.transactions_involving(account, since),
        )
        .await
        .map_err(|_| StoreError::Timeout("load transaction window"))??;

        walletd_fraud::screen(&history, &request, &self.limits, origin, now).map_err(|rejection| {
            info!(
                account = %account,
                kind = ?request.kind,
                amount = %request.amount,
                reason = rejection.code(),
                "fraud gate rejected request"
            );
            GateError::Rejected(rejection)
        })
    }
}
