use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_ether, Identity, UserProfile, Wei};

/// Administrator snapshot of every registered profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub administrator: Identity,
    pub users: Vec<UserExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExport {
    pub identity: Identity,
    pub name: String,
    pub age: u32,
    pub balance: Wei,
}

impl UserExport {
    fn new(identity: Identity, profile: UserProfile) -> Self {
        Self {
            identity,
            name: profile.name,
            age: profile.age,
            balance: profile.balance,
        }
    }
}

/// Exporter for converting ledger data to CSV or JSON.
/// Every export is made on behalf of `caller` and is subject to the same
/// access rules as the underlying queries.
pub struct Exporter<'a> {
    service: &'a LedgerService,
    caller: &'a Identity,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService, caller: &'a Identity) -> Self {
        Self { service, caller }
    }

    /// Export all profiles to CSV format. Administrator only.
    pub fn export_users_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let users = self.service.list_users(self.caller)?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["identity", "name", "age", "balance_wei", "balance"])?;

        for (identity, profile) in &users {
            csv_writer.write_record([
                identity.to_string(),
                profile.name.clone(),
                profile.age.to_string(),
                profile.balance.to_string(),
                format_ether(profile.balance),
            ])?;
        }

        csv_writer.flush()?;
        Ok(users.len())
    }

    /// Export all profiles as a JSON snapshot. Administrator only.
    pub fn export_users_json<W: Write>(&self, mut writer: W) -> Result<UsersSnapshot> {
        let users = self
            .service
            .list_users(self.caller)?
            .into_iter()
            .map(|(identity, profile)| UserExport::new(identity, profile))
            .collect();

        let snapshot = UsersSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            administrator: self.service.administrator().clone(),
            users,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }

    /// Export the caller's own deposit history to CSV format
    pub fn export_history_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let history = self.service.get_deposit_history(self.caller);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["position", "amount_wei", "amount"])?;

        for (position, amount) in history.iter().enumerate() {
            csv_writer.write_record([
                position.to_string(),
                amount.to_string(),
                format_ether(*amount),
            ])?;
        }

        csv_writer.flush()?;
        Ok(history.len())
    }

    /// Export the caller's own deposit history as a JSON array of wei amounts
    pub fn export_history_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let history = self.service.get_deposit_history(self.caller);
        let json = serde_json::to_string_pretty(&history)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        Ok(history.len())
    }
}
