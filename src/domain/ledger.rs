use std::collections::HashMap;
use std::collections::hash_map::Entry;

use thiserror::Error;

use super::{Account, Identity, Payout, UserProfile, Wei};

/// Rejections raised by ledger operations. A rejected call never mutates state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User already registered")]
    AlreadyRegistered,

    #[error("User not registered")]
    NotRegistered,

    #[error("Insufficient balance: balance {balance}, requested {requested}")]
    InsufficientBalance { balance: Wei, requested: Wei },

    #[error("Only owner can call this function")]
    NotOwner,

    #[error("Deposit of {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: Wei, amount: Wei },

    #[error("Transfer failed: {0}")]
    PayoutFailed(String),
}

/// Per-account ledger state machine.
///
/// Owns every account and the administrator identity fixed at construction.
/// Reads for identities without an account return zero values instead of failing.
#[derive(Debug, Clone)]
pub struct Ledger {
    administrator: Identity,
    accounts: HashMap<Identity, Account>,
}

impl Ledger {
    /// Create an empty ledger. The constructing identity becomes the administrator for good.
    pub fn new(administrator: Identity) -> Self {
        Self {
            administrator,
            accounts: HashMap::new(),
        }
    }

    /// Rebuild a ledger from persisted state.
    pub(crate) fn from_parts(
        administrator: Identity,
        accounts: HashMap<Identity, Account>,
    ) -> Self {
        Self {
            administrator,
            accounts,
        }
    }

    pub fn administrator(&self) -> &Identity {
        &self.administrator
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.accounts.contains_key(identity)
    }

    pub(crate) fn account(&self, identity: &Identity) -> Option<&Account> {
        self.accounts.get(identity)
    }

    pub(crate) fn accounts(&self) -> impl Iterator<Item = (&Identity, &Account)> {
        self.accounts.iter()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Put an account back to a previously captured state (`None` removes it).
    /// Used to undo an in-memory mutation whose persistence failed.
    pub(crate) fn restore(&mut self, identity: &Identity, snapshot: Option<Account>) {
        match snapshot {
            Some(account) => {
                self.accounts.insert(identity.clone(), account);
            }
            None => {
                self.accounts.remove(identity);
            }
        }
    }

    // ========================
    // Mutators
    // ========================

    /// Register `caller` with a profile. Registration happens once per identity.
    /// Any age is accepted, including zero. Returns the new, empty account.
    pub fn register(
        &mut self,
        caller: Identity,
        name: String,
        age: u32,
    ) -> Result<&Account, LedgerError> {
        match self.accounts.entry(caller) {
            Entry::Occupied(_) => Err(LedgerError::AlreadyRegistered),
            Entry::Vacant(slot) => Ok(slot.insert(Account::new(name, age))),
        }
    }

    /// Credit `amount` to the caller and append it to their deposit history.
    /// Zero deposits are recorded too. Returns the new balance.
    pub fn deposit(&mut self, caller: &Identity, amount: Wei) -> Result<Wei, LedgerError> {
        let account = self
            .accounts
            .get_mut(caller)
            .ok_or(LedgerError::NotRegistered)?;

        let balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                balance: account.balance,
                amount,
            })?;

        account.balance = balance;
        account.deposit_history.push(amount);
        Ok(balance)
    }

    /// Debit `amount` from the caller and hand it to `payout`.
    ///
    /// The balance is decremented before `payout` runs, so a re-entrant withdrawal
    /// made from inside the transfer sees the reduced balance. If the transfer
    /// fails the debit is reverted and nothing has happened.
    /// Returns the caller's balance after the withdrawal.
    pub fn withdraw<P>(
        &mut self,
        caller: &Identity,
        amount: Wei,
        payout: &mut P,
    ) -> Result<Wei, LedgerError>
    where
        P: Payout + ?Sized,
    {
        let account = self
            .accounts
            .get_mut(caller)
            .ok_or(LedgerError::NotRegistered)?;

        if amount > account.balance {
            return Err(LedgerError::InsufficientBalance {
                balance: account.balance,
                requested: amount,
            });
        }

        // Effects before interaction.
        account.balance -= amount;

        if let Err(err) = payout.send(self, caller, amount) {
            if let Some(account) = self.accounts.get_mut(caller) {
                account.balance = account.balance.saturating_add(amount);
            }
            return Err(LedgerError::PayoutFailed(err.to_string()));
        }

        Ok(self.get_balance(caller))
    }

    // ========================
    // Queries
    // ========================

    /// Balance of the caller's own account, zero when unregistered.
    pub fn get_balance(&self, caller: &Identity) -> Wei {
        self.accounts
            .get(caller)
            .map(|account| account.balance)
            .unwrap_or_default()
    }

    /// Deposit amounts of the caller's own account in chronological order.
    pub fn get_deposit_history(&self, caller: &Identity) -> Vec<Wei> {
        self.accounts
            .get(caller)
            .map(|account| account.deposit_history.clone())
            .unwrap_or_default()
    }

    /// Profile of `target`, readable only by the administrator.
    /// Unknown targets report `("", 0, 0)`.
    pub fn get_user(
        &self,
        admin: &Identity,
        target: &Identity,
    ) -> Result<UserProfile, LedgerError> {
        self.ensure_administrator(admin)?;
        Ok(self
            .accounts
            .get(target)
            .map(UserProfile::from)
            .unwrap_or_default())
    }

    /// Every registered profile, sorted by identity. Administrator only.
    pub fn list_users(
        &self,
        admin: &Identity,
    ) -> Result<Vec<(Identity, UserProfile)>, LedgerError> {
        self.ensure_administrator(admin)?;
        let mut users: Vec<(Identity, UserProfile)> = self
            .accounts
            .iter()
            .map(|(identity, account)| (identity.clone(), UserProfile::from(account)))
            .collect();
        users.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(users)
    }

    fn ensure_administrator(&self, caller: &Identity) -> Result<(), LedgerError> {
        if *caller != self.administrator {
            return Err(LedgerError::NotOwner);
        }
        Ok(())
    }
}
