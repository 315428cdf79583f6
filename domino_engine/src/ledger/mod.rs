//! Balance ledger port.
//!
//! The engine only ever increments and decrements user balances; balance
//! storage itself is an external collaborator. Decrements reject on
//! insufficient funds.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::game::entities::UserId;

pub mod postgres;

pub use postgres::PgLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger account not found: {0}")]
    AccountNotFound(UserId),

    #[error("insufficient funds for {user_id}: have {available}, need {required}")]
    InsufficientFunds {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    #[error("invalid ledger amount: {0}")]
    InvalidAmount(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Port to the external balance store. Amounts are VES.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Credit `amount` and return the new balance.
    async fn increment(&self, user_id: &str, amount: i64) -> LedgerResult<i64>;

    /// Debit `amount` and return the new balance; rejects if the balance
    /// would go negative.
    async fn decrement(&self, user_id: &str, amount: i64) -> LedgerResult<i64>;

    async fn balance(&self, user_id: &str) -> LedgerResult<i64>;
}

/// In-memory ledger for tests and local development.
#[derive(Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<UserId, i64>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance.
    pub async fn set_balance(&self, user_id: &str, amount: i64) {
        self.balances
            .lock()
            .await
            .insert(user_id.to_string(), amount);
    }
}

#[async_trait]
impl BalanceLedger for MemoryLedger {
    async fn increment(&self, user_id: &str, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut balances = self.balances.lock().await;
        let balance = balances.entry(user_id.to_string()).or_insert(0);
        *balance += amount;
        Ok(*balance)
    }

    async fn decrement(&self, user_id: &str, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let mut balances = self.balances.lock().await;
        let balance = balances
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.to_string()))?;
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                user_id: user_id.to_string(),
                available: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    async fn balance(&self, user_id: &str) -> LedgerResult<i64> {
        self.balances
            .lock()
            .await
            .get(user_id)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decrement_rejects_insufficient_funds() {
        let ledger = MemoryLedger::new();
        ledger.set_balance("u1", 100).await;
        assert_eq!(ledger.decrement("u1", 60).await.unwrap(), 40);
        let err = ledger.decrement("u1", 60).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                available: 40,
                required: 60,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn increment_creates_missing_account() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.increment("u2", 190).await.unwrap(), 190);
        assert_eq!(ledger.balance("u2").await.unwrap(), 190);
    }
}
