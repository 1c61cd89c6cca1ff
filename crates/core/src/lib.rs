//! `walletd-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, and the error model shared by every wallet crate.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, TransactionId};
pub use money::{Amount, Currency};
