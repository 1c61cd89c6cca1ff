use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use walletd_core::{AccountId, Currency, TransactionId};
use walletd_infra::{AccountStanding, MovementReceipt, Page, ScanReport};
use walletd_wallet::{
    Account, FraudReason, Transaction, TransactionMetadata, TransactionStatus, TransactionType,
    Wallet,
};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `/wallet/deposit` and `/wallet/withdraw`.
#[derive(Debug, Deserialize)]
pub struct MovementBody {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    pub receiver_email: Option<String>,
    pub receiver_id: Option<AccountId>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountBody {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub currency: Option<Currency>,
    pub limit: Option<usize>,
}

// -------------------------
// Response views
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataView {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<TransactionMetadata> for MetadataView {
    fn from(m: TransactionMetadata) -> Self {
        Self {
            ip_address: m.ip_address,
            user_agent: m.user_agent,
            timestamp: m.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
    pub sender: Option<AccountId>,
    pub receiver: Option<AccountId>,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub metadata: Option<MetadataView>,
    pub is_fraudulent: bool,
    pub fraud_reason: Option<FraudReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            amount: tx.amount.value(),
            currency: tx.currency,
            sender: tx.sender,
            receiver: tx.receiver,
            status: tx.status,
            description: tx.description,
            metadata: tx.metadata.map(MetadataView::from),
            is_fraudulent: tx.is_fraudulent,
            fraud_reason: tx.fraud_reason,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    pub message: &'static str,
    pub transaction: TransactionView,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

impl MovementView {
    pub fn new(message: &'static str, receipt: MovementReceipt) -> Self {
        Self {
            message,
            new_balance: receipt.new_balance.value(),
            transaction: receipt.transaction.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletView {
    pub currency: Currency,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl From<Wallet> for WalletView {
    fn from(w: Wallet) -> Self {
        Self {
            currency: w.currency,
            balance: w.balance.value(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceView {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub wallets: Vec<WalletView>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id_typed(),
            username: a.username().to_string(),
            email: a.email().to_string(),
            wallets: a.wallets().copied().map(WalletView::from).collect(),
            is_active: a.is_active(),
            is_deleted: a.is_deleted(),
            created_at: a.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationView {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionPageView {
    pub transactions: Vec<TransactionView>,
    pub pagination: PaginationView,
}

impl From<Page<Transaction>> for TransactionPageView {
    fn from(page: Page<Transaction>) -> Self {
        let pagination = PaginationView {
            page: page.pagination.page,
            limit: page.pagination.limit,
            total: page.total,
            pages: page.pages(),
        };
        Self {
            transactions: page.items.into_iter().map(TransactionView::from).collect(),
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingView {
    pub account_id: AccountId,
    pub username: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<usize>,
}

impl From<AccountStanding> for StandingView {
    fn from(s: AccountStanding) -> Self {
        Self {
            account_id: s.account_id,
            username: s.username,
            email: s.email,
            amount: s.amount,
            transaction_count: s.transaction_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanReportView {
    pub scanned: usize,
    pub findings: usize,
    pub flagged: usize,
    pub interrupted: bool,
}

impl From<ScanReport> for ScanReportView {
    fn from(r: ScanReport) -> Self {
        Self {
            scanned: r.scanned,
            findings: r.findings,
            flagged: r.flagged,
            interrupted: r.interrupted,
        }
    }
}
