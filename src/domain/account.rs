use serde::{Deserialize, Serialize};

use super::Wei;

/// Per-identity record of profile and balance state.
/// The profile is fixed at registration; only `balance` and `deposit_history` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub display_name: String,
    pub age: u32,
    pub balance: Wei,
    /// Deposit amounts in the order they were made. Append-only.
    pub deposit_history: Vec<Wei>,
}

impl Account {
    pub fn new(display_name: String, age: u32) -> Self {
        Self {
            display_name,
            age,
            balance: 0,
            deposit_history: Vec::new(),
        }
    }

    pub fn total_deposited(&self) -> Wei {
        self.deposit_history.iter().sum()
    }
}

/// Profile tuple reported to the administrator.
/// An identity without an account reads as the default value `("", 0, 0)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub age: u32,
    pub balance: Wei,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            name: account.display_name.clone(),
            age: account.age,
            balance: account.balance,
        }
    }
}
