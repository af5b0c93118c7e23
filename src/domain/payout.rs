use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Identity, Ledger, Wei};

pub type PayoutId = Uuid;

/// The host environment's native value-transfer mechanism.
///
/// `Ledger::withdraw` calls `send` after the caller's balance has already been
/// decremented. The ledger itself is handed to `send`, so a payee that calls
/// back into the ledger observes the post-withdrawal state.
pub trait Payout {
    fn send(
        &mut self,
        ledger: &mut Ledger,
        recipient: &Identity,
        amount: Wei,
    ) -> Result<(), PayoutError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PayoutError(pub String);

impl PayoutError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A value transfer that left the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: PayoutId,
    pub recipient: Identity,
    pub amount: Wei,
    pub created_at: DateTime<Utc>,
}

impl PayoutRecord {
    pub fn new(recipient: Identity, amount: Wei) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// Payout sink that queues transfers instead of executing them.
/// The persistent ledger drains it into the `payouts` table in the same
/// transaction as the balance update.
#[derive(Debug, Default)]
pub struct Outbox {
    records: Vec<PayoutRecord>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PayoutRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PayoutRecord> {
        self.records
    }

    pub fn total(&self) -> Wei {
        self.records.iter().map(|r| r.amount).sum()
    }
}

impl Payout for Outbox {
    fn send(
        &mut self,
        _ledger: &mut Ledger,
        recipient: &Identity,
        amount: Wei,
    ) -> Result<(), PayoutError> {
        self.records.push(PayoutRecord::new(recipient.clone(), amount));
        Ok(())
    }
}
