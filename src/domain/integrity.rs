use std::collections::HashMap;

use super::{Identity, Ledger, PayoutRecord, Wei};

/// Outcome of checking persisted ledger state for consistency.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub deposit_count: usize,
    pub payout_count: usize,
    pub total_deposited: Wei,
    pub total_paid_out: Wei,
    pub total_balance: Wei,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check that every balance equals its deposits minus the payouts it received,
/// and that no payout went to an unknown identity.
pub fn build_integrity_report(
    ledger: &Ledger,
    payouts: &[PayoutRecord],
    history_gaps: &[Identity],
) -> IntegrityReport {
    let mut report = IntegrityReport {
        account_count: ledger.account_count(),
        payout_count: payouts.len(),
        ..Default::default()
    };

    let mut paid_out: HashMap<&Identity, Wei> = HashMap::new();
    for payout in payouts {
        *paid_out.entry(&payout.recipient).or_insert(0) += payout.amount;
        report.total_paid_out += payout.amount;
        if !ledger.is_registered(&payout.recipient) {
            report.issues.push(format!(
                "Payout {} went to unregistered identity {}",
                payout.id, payout.recipient
            ));
        }
    }

    let mut accounts: Vec<_> = ledger.accounts().collect();
    accounts.sort_by(|a, b| a.0.cmp(b.0));

    for (identity, account) in accounts {
        let deposited = account.total_deposited();
        let withdrawn = paid_out.get(identity).copied().unwrap_or(0);

        report.deposit_count += account.deposit_history.len();
        report.total_deposited += deposited;
        report.total_balance += account.balance;

        match deposited.checked_sub(withdrawn) {
            Some(expected) if expected == account.balance => {}
            Some(expected) => report.issues.push(format!(
                "Account {} has balance {} but deposits minus payouts is {}",
                identity, account.balance, expected
            )),
            None => report.issues.push(format!(
                "Account {} received {} in payouts but only deposited {}",
                identity, withdrawn, deposited
            )),
        }
    }

    for identity in history_gaps {
        report.issues.push(format!(
            "Deposit history of {} has missing positions",
            identity
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use crate::domain::Outbox;

    use super::*;

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let owner = Identity::new("0xowner");
        let alice = Identity::new("0xalice");
        let mut ledger = Ledger::new(owner);
        ledger.register(alice.clone(), "Alice".into(), 25).unwrap();
        ledger.deposit(&alice, 100).unwrap();
        ledger.deposit(&alice, 0).unwrap();

        let mut outbox = Outbox::new();
        ledger.withdraw(&alice, 30, &mut outbox).unwrap();

        let report = build_integrity_report(&ledger, outbox.records(), &[]);
        assert!(report.is_healthy(), "issues: {:?}", report.issues);
        assert_eq!(report.account_count, 1);
        assert_eq!(report.deposit_count, 2);
        assert_eq!(report.payout_count, 1);
        assert_eq!(report.total_balance, 70);
        assert_eq!(report.total_deposited - report.total_paid_out, report.total_balance);
    }

    #[test]
    fn test_detects_balance_mismatch() {
        let alice = Identity::new("0xalice");
        let mut ledger = Ledger::new(Identity::new("0xowner"));
        ledger.register(alice.clone(), "Alice".into(), 25).unwrap();
        ledger.deposit(&alice, 100).unwrap();

        // Payout recorded without the matching debit
        let payouts = vec![PayoutRecord::new(alice.clone(), 40)];
        let report = build_integrity_report(&ledger, &payouts, &[]);
        assert!(!report.is_healthy());
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_detects_orphan_payout_and_gaps() {
        let ledger = Ledger::new(Identity::new("0xowner"));
        let ghost = Identity::new("0xghost");
        let payouts = vec![PayoutRecord::new(ghost.clone(), 1)];

        let report = build_integrity_report(&ledger, &payouts, &[ghost]);
        assert_eq!(report.issues.len(), 2);
    }
}
