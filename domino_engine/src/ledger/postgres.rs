//! Postgres-backed balance ledger.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use super::{BalanceLedger, LedgerError, LedgerResult};

/// Balance ledger over a `balances` table. Debits are a single atomic
/// check-and-update so concurrent purchases cannot overdraw.
#[derive(Clone)]
pub struct PgLedger {
    pool: Arc<PgPool>,
}

impl PgLedger {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create the backing table if missing.
    pub async fn init(&self) -> LedgerResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS balances (
                user_id TEXT PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BalanceLedger for PgLedger {
    async fn increment(&self, user_id: &str, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let row = sqlx::query(
            r#"
            INSERT INTO balances (user_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET balance = balances.balance + $2, updated_at = NOW()
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(row.get("balance"))
    }

    async fn decrement(&self, user_id: &str, amount: i64) -> LedgerResult<i64> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let debited = sqlx::query(
            r#"
            UPDATE balances
            SET balance = balance - $1, updated_at = NOW()
            WHERE user_id = $2 AND balance >= $1
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match debited {
            Some(row) => Ok(row.get("balance")),
            None => {
                // Distinguish a missing account from a short balance.
                let check = sqlx::query("SELECT balance FROM balances WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(self.pool.as_ref())
                    .await?;
                match check {
                    Some(row) => Err(LedgerError::InsufficientFunds {
                        user_id: user_id.to_string(),
                        available: row.get("balance"),
                        required: amount,
                    }),
                    None => Err(LedgerError::AccountNotFound(user_id.to_string())),
                }
            }
        }
    }

    async fn balance(&self, user_id: &str) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.to_string()))?;
        Ok(row.get("balance"))
    }
}
