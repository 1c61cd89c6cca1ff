use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use walletd_core::{AccountId, Amount, Currency, DomainError, DomainResult, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Flagged,
}

/// Why a transaction carries a fraud mark, or why a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudReason {
    RateLimitExceeded,
    SuspiciousAmount,
    MultipleFailedAttempts,
    UnusualPattern,
    SystemError,
}

impl FraudReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudReason::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            FraudReason::SuspiciousAmount => "SUSPICIOUS_AMOUNT",
            FraudReason::MultipleFailedAttempts => "MULTIPLE_FAILED_ATTEMPTS",
            FraudReason::UnusualPattern => "UNUSUAL_PATTERN",
            FraudReason::SystemError => "SYSTEM_ERROR",
        }
    }
}

/// Request provenance captured by the fraud gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A durable record of one money movement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    pub currency: Currency,
    pub sender: Option<AccountId>,
    pub receiver: Option<AccountId>,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub metadata: Option<TransactionMetadata>,
    pub is_fraudulent: bool,
    pub fraud_reason: Option<FraudReason>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields shared by every new transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: TransactionId,
    pub amount: Amount,
    pub currency: Currency,
    pub description: Option<String>,
    pub metadata: Option<TransactionMetadata>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn deposit(receiver: AccountId, new: NewTransaction) -> DomainResult<Self> {
        Self::pending(TransactionType::Deposit, None, Some(receiver), new)
    }

    pub fn withdrawal(sender: AccountId, new: NewTransaction) -> DomainResult<Self> {
        Self::pending(TransactionType::Withdrawal, Some(sender), None, new)
    }

    pub fn transfer(sender: AccountId, receiver: AccountId, new: NewTransaction) -> DomainResult<Self> {
        if sender == receiver {
            return Err(DomainError::validation("Cannot transfer to yourself"));
        }
        Self::pending(TransactionType::Transfer, Some(sender), Some(receiver), new)
    }

    fn pending(
        kind: TransactionType,
        sender: Option<AccountId>,
        receiver: Option<AccountId>,
        new: NewTransaction,
    ) -> DomainResult<Self> {
        if new.amount.is_zero() {
            return Err(DomainError::validation(
                "Invalid amount: must be a positive number",
            ));
        }

        Ok(Self {
            id: new.id,
            kind,
            amount: new.amount,
            currency: new.currency,
            sender,
            receiver,
            status: TransactionStatus::Pending,
            description: new.description,
            metadata: new.metadata,
            is_fraudulent: false,
            fraud_reason: None,
            is_deleted: false,
            created_at: new.created_at,
            updated_at: new.created_at,
        })
    }

    pub fn involves(&self, account: AccountId) -> bool {
        self.sender == Some(account) || self.receiver == Some(account)
    }

    pub fn completed(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_pending("complete")?;
        let mut next = self.clone();
        next.status = TransactionStatus::Completed;
        next.updated_at = now;
        Ok(next)
    }

    pub fn failed(&self, reason: FraudReason, now: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_pending("fail")?;
        let mut next = self.clone();
        next.status = TransactionStatus::Failed;
        next.fraud_reason = Some(reason);
        next.updated_at = now;
        Ok(next)
    }

    /// Fraud mark applied to settled history. Pending records belong to an
    /// in-flight movement and cannot be flagged.
    pub fn flagged(&self, reason: FraudReason, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status == TransactionStatus::Pending {
            return Err(DomainError::invariant("cannot flag a pending transaction"));
        }
        let mut next = self.clone();
        next.status = TransactionStatus::Flagged;
        next.is_fraudulent = true;
        next.fraud_reason = Some(reason);
        next.updated_at = now;
        Ok(next)
    }

    pub fn soft_deleted(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.is_deleted = true;
        next.updated_at = now;
        next
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::invariant(format!(
                "cannot {action} transaction in status {:?}",
                self.status
            )));
        }
        Ok(())
    }
}
