use tracing::{debug, error, info};

use crate::domain::{
    build_integrity_report, Account, Identity, IntegrityReport, Ledger, LedgerError, Outbox,
    PayoutRecord, UserProfile, Wei,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the ledger operations on top of a SQLite database.
/// This is the primary interface for any client (CLI, API, etc.).
///
/// Every mutation is applied to the in-memory ledger first and then persisted.
/// If persisting fails the in-memory account is put back, so a rejected or failed
/// call leaves both copies untouched.
pub struct LedgerService {
    repo: Repository,
    ledger: Ledger,
}

/// Result of a successful withdrawal
#[derive(Debug)]
pub struct WithdrawalResult {
    pub balance: Wei,
    pub payouts: Vec<PayoutRecord>,
}

impl LedgerService {
    /// Create a service over an already loaded ledger.
    pub fn new(repo: Repository, ledger: Ledger) -> Self {
        Self { repo, ledger }
    }

    /// Initialize a new database at the given path. `administrator` is the
    /// constructing identity and can never be changed afterwards.
    pub async fn init(database_path: &str, administrator: Identity) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;

        if !repo.save_administrator(&administrator).await? {
            let existing = repo
                .get_administrator()
                .await?
                .map(|existing| existing.to_string())
                .unwrap_or_default();
            return Err(AppError::AlreadyInitialized(existing));
        }

        info!(database = database_path, %administrator, "Initialized ledger");
        Ok(Self::new(repo, Ledger::new(administrator)))
    }

    /// Connect to an existing database and load its ledger.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        let ledger = repo.load_ledger().await?.ok_or(AppError::NotInitialized)?;

        debug!(
            database = database_path,
            accounts = ledger.account_count(),
            "Loaded ledger"
        );
        Ok(Self::new(repo, ledger))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn administrator(&self) -> &Identity {
        self.ledger.administrator()
    }

    // ========================
    // Mutators
    // ========================

    /// Register `caller` with a display name and age.
    pub async fn register(
        &mut self,
        caller: &Identity,
        name: String,
        age: u32,
    ) -> Result<(), AppError> {
        let account = self
            .ledger
            .register(caller.clone(), name, age)
            .inspect_err(|err| rejected("register", caller, err))?;

        if let Err(err) = self.repo.insert_account(caller, account).await {
            self.rollback(caller, None, &err);
            return Err(err.into());
        }

        info!(%caller, age, "Registered account");
        Ok(())
    }

    /// Deposit `amount` into the caller's account. Returns the new balance.
    pub async fn deposit(&mut self, caller: &Identity, amount: Wei) -> Result<Wei, AppError> {
        let snapshot = self.ledger.account(caller).cloned();
        let previous = self.ledger.get_balance(caller);

        let balance = self
            .ledger
            .deposit(caller, amount)
            .inspect_err(|err| rejected("deposit", caller, err))?;
        let position = self
            .ledger
            .account(caller)
            .map(|account| account.deposit_history.len() - 1)
            .unwrap_or_default();

        if let Err(err) = self
            .repo
            .record_deposit(caller, position, amount, previous, balance)
            .await
        {
            self.rollback(caller, snapshot, &err);
            return Err(err.into());
        }

        info!(%caller, amount = %amount, balance = %balance, "Recorded deposit");
        Ok(balance)
    }

    /// Withdraw `amount` from the caller's account and queue the payout to them.
    ///
    /// The balance update and the queued payout are written in one transaction,
    /// and only if the stored balance still matches the one this service loaded.
    /// A withdrawal against a stale balance fails with `AppError::Database`.
    pub async fn withdraw(
        &mut self,
        caller: &Identity,
        amount: Wei,
    ) -> Result<WithdrawalResult, AppError> {
        let snapshot = self.ledger.account(caller).cloned();
        let previous = self.ledger.get_balance(caller);
        let mut outbox = Outbox::new();

        let balance = self
            .ledger
            .withdraw(caller, amount, &mut outbox)
            .inspect_err(|err| rejected("withdraw", caller, err))?;

        if let Err(err) = self
            .repo
            .record_withdrawal(caller, previous, balance, outbox.records())
            .await
        {
            self.rollback(caller, snapshot, &err);
            return Err(err.into());
        }

        info!(%caller, amount = %amount, balance = %balance, "Recorded withdrawal");
        Ok(WithdrawalResult {
            balance,
            payouts: outbox.into_records(),
        })
    }

    fn rollback(&mut self, caller: &Identity, snapshot: Option<Account>, err: &anyhow::Error) {
        error!(%caller, error = %err, "Failed to persist ledger change, reverting");
        self.ledger.restore(caller, snapshot);
    }

    // ========================
    // Queries
    // ========================

    /// Balance of the caller's own account (zero if unregistered).
    pub fn get_balance(&self, caller: &Identity) -> Wei {
        self.ledger.get_balance(caller)
    }

    /// Deposit history of the caller's own account, oldest first.
    pub fn get_deposit_history(&self, caller: &Identity) -> Vec<Wei> {
        self.ledger.get_deposit_history(caller)
    }

    /// Profile of `target`. Only the administrator may ask.
    pub fn get_user(&self, admin: &Identity, target: &Identity) -> Result<UserProfile, AppError> {
        Ok(self
            .ledger
            .get_user(admin, target)
            .inspect_err(|err| rejected("get_user", admin, err))?)
    }

    /// All registered profiles. Only the administrator may ask.
    pub fn list_users(&self, admin: &Identity) -> Result<Vec<(Identity, UserProfile)>, AppError> {
        Ok(self
            .ledger
            .list_users(admin)
            .inspect_err(|err| rejected("list_users", admin, err))?)
    }

    /// Payouts released to the caller, oldest first.
    pub async fn list_payouts(&self, caller: &Identity) -> Result<Vec<PayoutRecord>, AppError> {
        Ok(self.repo.list_payouts(Some(caller)).await?)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Re-read the database and check it for consistency.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stored = self
            .repo
            .load_ledger()
            .await?
            .ok_or(AppError::NotInitialized)?;
        let payouts = self.repo.list_payouts(None).await?;
        let stats = self.repo.get_integrity_stats().await?;

        let report = build_integrity_report(&stored, &payouts, &stats.history_gaps);

        debug!(
            accounts = stats.account_count,
            deposits = stats.deposit_count,
            payouts = stats.payout_count,
            issues = report.issues.len(),
            "Checked ledger integrity"
        );
        Ok(report)
    }
}

fn rejected(operation: &str, caller: &Identity, err: &LedgerError) {
    debug!(operation, %caller, reason = %err, "Rejected call");
}
