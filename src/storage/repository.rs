use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{Account, Identity, Ledger, PayoutRecord, Wei};

use super::MIGRATION_001_INITIAL;

const ADMINISTRATOR_KEY: &str = "administrator";

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub deposit_count: i64,
    pub payout_count: i64,
    /// Accounts whose deposit positions are not exactly `0..n`.
    pub history_gaps: Vec<Identity>,
}

/// Repository for persisting the account mapping and its payouts.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Administrator
    // ========================

    pub async fn get_administrator(&self) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT value FROM ledger_meta WHERE key = ?")
            .bind(ADMINISTRATOR_KEY)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch administrator")?;

        Ok(row.map(|row| Identity::new(row.get::<String, _>("value"))))
    }

    /// Store the administrator unless one is already stored.
    /// Returns `false` if the database already had an administrator.
    pub async fn save_administrator(&self, administrator: &Identity) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO ledger_meta (key, value) VALUES (?, ?)")
            .bind(ADMINISTRATOR_KEY)
            .bind(administrator.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to save administrator")?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a freshly registered account.
    pub async fn insert_account(&self, identity: &Identity, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (identity, display_name, age, balance, registered_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(identity.as_str())
        .bind(&account.display_name)
        .bind(i64::from(account.age))
        .bind(account.balance.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Append a deposit to the history and move the balance from `previous` to
    /// `balance`, atomically.
    pub async fn record_deposit(
        &self,
        identity: &Identity,
        position: usize,
        amount: Wei,
        previous: Wei,
        balance: Wei,
    ) -> Result<()> {
        let position = i64::try_from(position).context("Deposit position out of range")?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO deposits (identity, position, amount, deposited_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(identity.as_str())
        .bind(position)
        .bind(amount.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save deposit")?;

        Self::update_balance(&mut tx, identity, previous, balance).await?;

        tx.commit().await.context("Failed to commit deposit")?;
        Ok(())
    }

    /// Move the balance from `previous` to the post-withdrawal `balance` and
    /// queue its payouts, atomically.
    pub async fn record_withdrawal(
        &self,
        identity: &Identity,
        previous: Wei,
        balance: Wei,
        payouts: &[PayoutRecord],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        Self::update_balance(&mut tx, identity, previous, balance).await?;

        for payout in payouts {
            sqlx::query(
                r#"
                INSERT INTO payouts (id, recipient, amount, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(payout.id.to_string())
            .bind(payout.recipient.as_str())
            .bind(payout.amount.to_string())
            .bind(payout.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save payout")?;
        }

        tx.commit().await.context("Failed to commit withdrawal")?;
        Ok(())
    }

    /// Compare-and-set the stored balance. Fails when the row no longer holds
    /// `previous`, i.e. another writer changed the account since it was loaded.
    async fn update_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        identity: &Identity,
        previous: Wei,
        balance: Wei,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE accounts SET balance = ? WHERE identity = ? AND balance = ?")
                .bind(balance.to_string())
                .bind(identity.as_str())
                .bind(previous.to_string())
                .execute(&mut **tx)
                .await
                .context("Failed to update balance")?;

        if result.rows_affected() != 1 {
            anyhow::bail!(
                "Account {} changed in the database since it was loaded; reconnect and retry",
                identity
            );
        }
        Ok(())
    }

    /// Load the whole ledger. Returns `None` if no administrator has been stored yet.
    pub async fn load_ledger(&self) -> Result<Option<Ledger>> {
        let Some(administrator) = self.get_administrator().await? else {
            return Ok(None);
        };

        let rows = sqlx::query("SELECT identity, display_name, age, balance FROM accounts")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        let mut accounts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let (identity, account) = Self::row_to_account(row)?;
            accounts.insert(identity, account);
        }

        let rows = sqlx::query("SELECT identity, amount FROM deposits ORDER BY identity, position")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list deposits")?;

        for row in &rows {
            let identity = Identity::new(row.get::<String, _>("identity"));
            let amount = parse_wei(&row.get::<String, _>("amount"))?;
            accounts
                .get_mut(&identity)
                .ok_or_else(|| anyhow::anyhow!("Deposit for unknown account {}", identity))?
                .deposit_history
                .push(amount);
        }

        Ok(Some(Ledger::from_parts(administrator, accounts)))
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<(Identity, Account)> {
        let identity = Identity::new(row.get::<String, _>("identity"));
        let age: i64 = row.get("age");

        Ok((
            identity,
            Account {
                display_name: row.get("display_name"),
                age: u32::try_from(age).context("Invalid account age")?,
                balance: parse_wei(&row.get::<String, _>("balance"))?,
                deposit_history: Vec::new(),
            },
        ))
    }

    // ========================
    // Payout operations
    // ========================

    /// List payouts in insertion order, optionally for a single recipient.
    pub async fn list_payouts(&self, recipient: Option<&Identity>) -> Result<Vec<PayoutRecord>> {
        let rows = match recipient {
            Some(recipient) => {
                sqlx::query(
                    r#"
                    SELECT id, recipient, amount, created_at
                    FROM payouts
                    WHERE recipient = ?
                    ORDER BY rowid
                    "#,
                )
                .bind(recipient.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT id, recipient, amount, created_at FROM payouts ORDER BY rowid")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to list payouts")?;

        rows.iter().map(Self::row_to_payout).collect()
    }

    fn row_to_payout(row: &sqlx::sqlite::SqliteRow) -> Result<PayoutRecord> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(PayoutRecord {
            id: Uuid::parse_str(&id_str).context("Invalid payout ID")?,
            recipient: Identity::new(row.get::<String, _>("recipient")),
            amount: parse_wei(&row.get::<String, _>("amount"))?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Integrity
    // ========================

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let deposit_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM deposits")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let payout_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM payouts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let rows = sqlx::query(
            r#"
            SELECT identity
            FROM deposits
            GROUP BY identity
            HAVING MIN(position) != 0 OR MAX(position) + 1 != COUNT(*)
            ORDER BY identity
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to check deposit positions")?;

        let history_gaps = rows
            .iter()
            .map(|row| Identity::new(row.get::<String, _>("identity")))
            .collect();

        Ok(IntegrityStats {
            account_count,
            deposit_count,
            payout_count,
            history_gaps,
        })
    }
}

fn parse_wei(value: &str) -> Result<Wei> {
    value
        .parse()
        .with_context(|| format!("Invalid stored amount: {}", value))
}
