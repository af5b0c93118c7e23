// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;
use userbank::application::LedgerService;
use userbank::domain::{parse_ether, Identity, Wei};

/// Identities used across the tests: the deploying administrator and two users.
pub struct Signers {
    pub owner: Identity,
    pub user1: Identity,
    pub user2: Identity,
}

impl Signers {
    pub fn new() -> Self {
        Self {
            owner: Identity::new("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            user1: Identity::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            user2: Identity::new("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
        }
    }
}

/// Helper to create a test service with a temporary database, administered by `Signers::owner`
pub async fn test_service() -> Result<(LedgerService, Signers, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let signers = Signers::new();
    let service = LedgerService::init(db_path.to_str().unwrap(), signers.owner.clone()).await?;
    Ok((service, signers, temp_dir))
}

/// Path of the database inside a test directory
pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

/// Parse an ether amount, panicking on bad input
pub fn ether(amount: &str) -> Wei {
    parse_ether(amount).unwrap()
}

/// Register `user1` as Alice (25)
pub async fn register_alice(service: &mut LedgerService, signers: &Signers) -> Result<()> {
    service
        .register(&signers.user1, "Alice".to_string(), 25)
        .await?;
    Ok(())
}
