//! Service wiring: one store shared by the ledger, the fraud gate, admin
//! reports, and the background scanner.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use walletd_infra::{
    AdminReports, FraudGate, FraudScanner, InMemoryWalletStore, LedgerService, ScanReport,
    ScannerHandle, StoreError, WalletConfig, WalletStore,
};

pub type DynStore = Arc<dyn WalletStore>;

pub struct AppServices {
    pub ledger: LedgerService<DynStore>,
    pub gate: FraudGate<DynStore>,
    pub admin: AdminReports<DynStore>,
    scanner: FraudScanner<DynStore>,
    runner: Mutex<Option<ScannerHandle>>,
    config: WalletConfig,
}

/// In-memory wiring (the only store this service ships with).
pub fn build_services(config: &WalletConfig) -> AppServices {
    build_services_with_store(config, Arc::new(InMemoryWalletStore::default()))
}

pub fn build_services_with_store(config: &WalletConfig, store: DynStore) -> AppServices {
    let timeout = config.ledger.store_timeout;
    AppServices {
        ledger: LedgerService::new(store.clone(), config.limits.clone(), config.ledger.clone()),
        gate: FraudGate::new(store.clone(), config.limits.clone(), timeout),
        admin: AdminReports::new(store.clone(), timeout),
        scanner: FraudScanner::new(store, config.scan_rules()),
        runner: Mutex::new(None),
        config: config.clone(),
    }
}

impl AppServices {
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Start the scheduled scanner unless disabled or already running.
    /// Must be called from within a tokio runtime.
    pub async fn start_scanner(&self) -> bool {
        if !self.config.scan_enabled {
            tracing::info!("fraud scanner disabled by configuration");
            return false;
        }
        let mut runner = self.runner.lock().await;
        if runner.is_none() {
            *runner = Some(self.config.scanner.spawn(self.scanner.clone()));
        }
        true
    }

    /// Ask for an immediate pass.
    ///
    /// With the scheduled runner active the pass is queued on it and `None`
    /// is returned; otherwise the pass runs inline and its report returned.
    pub async fn trigger_scan(&self) -> Result<Option<ScanReport>, StoreError> {
        if let Some(handle) = self.runner.lock().await.as_ref() {
            handle.trigger();
            return Ok(None);
        }
        let report = self
            .scanner
            .scan(chrono::Utc::now(), &CancellationToken::new())
            .await?;
        Ok(Some(report))
    }

    /// Stop the scanner and wait for an in-flight pass to wind down.
    pub async fn shutdown(&self) {
        let handle = self.runner.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
