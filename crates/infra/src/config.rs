//! Configuration loading and representation.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use walletd_fraud::{FraudLimits, ScanRules};

use crate::fraud::{ScanSchedule, ScannerRunner};
use crate::ledger::LedgerSettings;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub port: u16,
    /// HS256 secret for bearer tokens; `None` means "use the dev default".
    pub jwt_secret: Option<String>,
    pub limits: FraudLimits,
    pub ledger: LedgerSettings,
    pub scan_enabled: bool,
    pub scanner: ScannerRunner,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            jwt_secret: None,
            limits: FraudLimits::default(),
            ledger: LedgerSettings::default(),
            scan_enabled: true,
            scanner: ScannerRunner::default(),
        }
    }
}

impl WalletConfig {
    /// Read from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse::<u16>(&lookup, "PORT")? {
            cfg.port = port;
        }
        cfg.jwt_secret = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty());

        if let Some(v) = parse::<Decimal>(&lookup, "MIN_TRANSACTION_AMOUNT")? {
            cfg.limits.min_transaction_amount = v;
        }
        if let Some(v) = parse::<Decimal>(&lookup, "MAX_TRANSACTION_AMOUNT")? {
            cfg.limits.max_transaction_amount = v;
        }
        if let Some(v) = parse::<Decimal>(&lookup, "MAX_DAILY_TRANSFER_LIMIT")? {
            cfg.limits.max_daily_transfer = v;
        }
        if let Some(ms) = parse::<u64>(&lookup, "STORE_TIMEOUT_MS")? {
            cfg.ledger.store_timeout = Duration::from_millis(ms);
        }
        if let Some(enabled) = parse::<bool>(&lookup, "FRAUD_SCAN_ENABLED")? {
            cfg.scan_enabled = enabled;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn scan_rules(&self) -> ScanRules {
        ScanRules::from_limits(&self.limits)
    }

    pub fn scan_schedule(&self) -> &ScanSchedule {
        &self.scanner.schedule
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.min_transaction_amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "MIN_TRANSACTION_AMOUNT",
                message: "must be positive".to_string(),
            });
        }
        if limits.max_transaction_amount < limits.min_transaction_amount {
            return Err(ConfigError::Invalid {
                key: "MAX_TRANSACTION_AMOUNT",
                message: "must not be below MIN_TRANSACTION_AMOUNT".to_string(),
            });
        }
        if limits.max_daily_transfer <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "MAX_DAILY_TRANSFER_LIMIT",
                message: "must be positive".to_string(),
            });
        }
        if self.ledger.store_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "STORE_TIMEOUT_MS",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
    }
}
