use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::domain::{format_ether, parse_ether, EmptyIdentity, Identity, Wei};
use crate::io::Exporter;

/// UserBank - per-account ledger
#[derive(Parser)]
#[command(name = "userbank")]
#[command(about = "A per-account ledger with deposits, withdrawals and an administrator role")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, global = true, default_value = "userbank.db")]
    pub database: String,

    /// Identity making the call (e.g. an address like 0xabc...)
    #[arg(short, long, global = true, value_parser = parse_identity)]
    pub caller: Option<Identity>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database; the caller becomes the administrator
    Init,

    /// Register the caller with a profile
    Register {
        /// Display name
        name: String,

        /// Age (any non-negative integer)
        age: u32,
    },

    /// Deposit funds into the caller's account
    Deposit {
        /// Amount in ether (e.g. "1.5"), or in wei with --wei
        amount: String,

        /// Interpret the amount as integer wei
        #[arg(long)]
        wei: bool,
    },

    /// Withdraw funds from the caller's account
    Withdraw {
        /// Amount in ether (e.g. "1.5"), or in wei with --wei
        amount: String,

        /// Interpret the amount as integer wei
        #[arg(long)]
        wei: bool,
    },

    /// Show the caller's balance
    Balance,

    /// Show the caller's deposit history
    History,

    /// Show a user's profile (administrator only)
    User {
        /// Identity to look up
        #[arg(value_parser = parse_identity)]
        target: Identity,
    },

    /// List every registered user (administrator only)
    Users,

    /// Show the administrator identity
    Owner,

    /// List payouts released to the caller
    Payouts,

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: users (administrator only), history
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv)
        #[arg(short, long)]
        format: Option<String>,
    },
}

impl Cli {
    fn caller(&self) -> Result<&Identity> {
        self.caller
            .as_ref()
            .context("This command needs the calling identity (--caller <identity>)")
    }

    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Init => {
                let administrator = self.caller()?.clone();
                let service = LedgerService::init(&self.database, administrator).await?;
                println!("Database initialized: {}", self.database);
                println!("Administrator: {}", service.administrator());
            }

            Commands::Register { name, age } => {
                let mut service = LedgerService::connect(&self.database).await?;
                let caller = self.caller()?;
                service.register(caller, name.clone(), *age).await?;
                println!("Registered {} ({}, age {})", caller, name, age);
            }

            Commands::Deposit { amount, wei } => {
                let mut service = LedgerService::connect(&self.database).await?;
                let caller = self.caller()?;
                let amount = parse_amount(amount, *wei)?;
                let balance = service.deposit(caller, amount).await?;
                println!(
                    "Deposited {}. Balance: {}",
                    format_ether(amount),
                    format_ether(balance)
                );
            }

            Commands::Withdraw { amount, wei } => {
                let mut service = LedgerService::connect(&self.database).await?;
                let caller = self.caller()?;
                let amount = parse_amount(amount, *wei)?;
                let result = service.withdraw(caller, amount).await?;
                for payout in &result.payouts {
                    println!(
                        "Released {} to {} ({})",
                        format_ether(payout.amount),
                        payout.recipient,
                        payout.id
                    );
                }
                println!("Balance: {}", format_ether(result.balance));
            }

            Commands::Balance => {
                let service = LedgerService::connect(&self.database).await?;
                let caller = self.caller()?;
                println!("{}", format_ether(service.get_balance(caller)));
            }

            Commands::History => {
                let service = LedgerService::connect(&self.database).await?;
                run_history_command(&service, self.caller()?);
            }

            Commands::User { target } => {
                let service = LedgerService::connect(&self.database).await?;
                let profile = service.get_user(self.caller()?, target)?;
                println!("Identity: {}", target);
                println!("Name:     {}", profile.name);
                println!("Age:      {}", profile.age);
                println!("Balance:  {}", format_ether(profile.balance));
            }

            Commands::Users => {
                let service = LedgerService::connect(&self.database).await?;
                run_users_command(&service, self.caller()?)?;
            }

            Commands::Owner => {
                let service = LedgerService::connect(&self.database).await?;
                println!("{}", service.administrator());
            }

            Commands::Payouts => {
                let service = LedgerService::connect(&self.database).await?;
                run_payouts_command(&service, self.caller()?).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(
                    &service,
                    self.caller()?,
                    export_type,
                    output.as_deref(),
                    format.as_deref(),
                )?;
            }
        }

        Ok(())
    }
}

fn parse_identity(raw: &str) -> Result<Identity, EmptyIdentity> {
    raw.parse()
}

fn parse_amount(amount: &str, wei: bool) -> Result<Wei> {
    if wei {
        amount
            .trim()
            .parse()
            .with_context(|| format!("Invalid wei amount '{}'", amount))
    } else {
        parse_ether(amount)
            .with_context(|| format!("Invalid amount '{}'. Use '1.5' or '2'", amount))
    }
}

fn run_history_command(service: &LedgerService, caller: &Identity) {
    let history = service.get_deposit_history(caller);
    if history.is_empty() {
        println!("No deposits.");
        return;
    }

    println!("{:>4} {:>24}", "#", "AMOUNT");
    println!("{}", "-".repeat(29));
    for (position, amount) in history.iter().enumerate() {
        println!("{:>4} {:>24}", position + 1, format_ether(*amount));
    }
}

fn run_users_command(service: &LedgerService, caller: &Identity) -> Result<()> {
    let users = service.list_users(caller)?;
    if users.is_empty() {
        println!("No users registered.");
        return Ok(());
    }

    println!(
        "{:<44} {:<20} {:>5} {:>24}",
        "IDENTITY", "NAME", "AGE", "BALANCE"
    );
    println!("{}", "-".repeat(96));
    for (identity, profile) in users {
        println!(
            "{:<44} {:<20} {:>5} {:>24}",
            identity.as_str(),
            truncate(&profile.name, 20),
            profile.age,
            format_ether(profile.balance)
        );
    }
    Ok(())
}

async fn run_payouts_command(service: &LedgerService, caller: &Identity) -> Result<()> {
    let payouts = service.list_payouts(caller).await?;
    if payouts.is_empty() {
        println!("No payouts.");
        return Ok(());
    }

    println!("{:<36} {:<20} {:>24}", "ID", "DATE", "AMOUNT");
    println!("{}", "-".repeat(82));
    for payout in payouts {
        println!(
            "{:<36} {:<20} {:>24}",
            payout.id,
            payout.created_at.format("%Y-%m-%d %H:%M:%S"),
            format_ether(payout.amount)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Deposits:  {}", report.deposit_count);
    println!("Payouts:   {}", report.payout_count);
    println!();
    println!("  {:<12} {:>24}", "Deposited:", format_ether(report.total_deposited));
    println!("  {:<12} {:>24}", "Paid out:", format_ether(report.total_paid_out));
    println!("  {}", "-".repeat(37));
    println!("  {:<12} {:>24}", "Held:", format_ether(report.total_balance));
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn run_export_command(
    service: &LedgerService,
    caller: &Identity,
    export_type: &str,
    output: Option<&str>,
    format: Option<&str>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file '{}'", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    let exporter = Exporter::new(service, caller);
    let format = format.unwrap_or("csv");

    let count = match (export_type, format) {
        ("users", "csv") => exporter.export_users_csv(writer)?,
        ("users", "json") => exporter.export_users_json(writer)?.users.len(),
        ("history", "csv") => exporter.export_history_csv(writer)?,
        ("history", "json") => exporter.export_history_json(writer)?,
        ("users" | "history", other) => {
            anyhow::bail!("Unknown format '{}'. Use csv or json", other)
        }
        (other, _) => anyhow::bail!("Unknown export type '{}'. Use users or history", other),
    };

    if let Some(path) = output {
        eprintln!("Exported {} records to {}", count, path);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WEI_PER_ETHER;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.5", false).unwrap(), 3 * WEI_PER_ETHER / 2);
        assert_eq!(parse_amount("15", true).unwrap(), 15);
        assert!(parse_amount("1.5", true).is_err());
        assert!(parse_amount("-1", false).is_err());
    }

    #[test]
    fn test_cli_parses_caller_after_subcommand() {
        let cli =
            Cli::try_parse_from(["userbank", "deposit", "1.0", "--caller", "0xAlice"]).unwrap();
        assert_eq!(cli.caller, Some(Identity::new("0xalice")));
        assert!(matches!(cli.command, Commands::Deposit { wei: false, .. }));
    }

    #[test]
    fn test_cli_parses_database_after_subcommand() {
        let cli = Cli::try_parse_from([
            "userbank", "balance", "--caller", "0xabc", "--database", "other.db",
        ])
        .unwrap();
        assert_eq!(cli.database, "other.db");
        assert!(matches!(cli.command, Commands::Balance));

        let cli = Cli::try_parse_from(["userbank", "owner"]).unwrap();
        assert_eq!(cli.database, "userbank.db");
    }

    #[test]
    fn test_cli_rejects_blank_caller() {
        assert!(Cli::try_parse_from(["userbank", "balance", "--caller", "  "]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Alice", 20), "Alice");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
