//! Ledger snapshots
//!
//! The store is seeded once at startup from a snapshot: either the built-in
//! demo ledger or a JSON file supplied by the operator.

use chrono::NaiveDate;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::account::{Account, AccountKind, AccountStatus, Transaction, TransactionStatus};
use crate::error::{LedgerError, Result};

/// Accounts plus per-account transaction history
///
/// Account order is resolution priority. Each history is most-recent-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub accounts: Vec<Account>,
    /// Transaction history keyed by account id
    #[serde(default)]
    pub transactions: IndexMap<String, Vec<Transaction>>,
}

impl LedgerSnapshot {
    /// Parse a snapshot from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let snapshot = Self::from_json(&json)?;
        debug!(
            "Loaded ledger snapshot from {:?} ({} accounts)",
            path,
            snapshot.accounts.len()
        );
        Ok(snapshot)
    }

    /// Check the invariants the store relies on
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();

        for account in &self.accounts {
            if !ids.insert(account.id.as_str()) {
                return Err(LedgerError::Snapshot(format!(
                    "duplicate account id {}",
                    account.id
                )));
            }

            if account.is_card()
                && (account.available_credit.is_none() || account.credit_limit.is_none())
            {
                return Err(LedgerError::Snapshot(format!(
                    "credit card {} is missing available_credit or credit_limit",
                    account.id
                )));
            }

            if !account.is_consistent() {
                return Err(LedgerError::Snapshot(format!(
                    "account {} has locked={} but status={:?}",
                    account.id, account.locked, account.status
                )));
            }
        }

        if let Some(orphan) = self.transactions.keys().find(|id| !ids.contains(id.as_str())) {
            return Err(LedgerError::Snapshot(format!(
                "transactions reference unknown account {}",
                orphan
            )));
        }

        Ok(())
    }

    /// The built-in demo ledger
    pub fn demo() -> Self {
        let accounts = vec![
            card(
                "acct_venturex_5660",
                "Venture X",
                "5660",
                dec!(2847.53),
                dec!(17152.47),
                dec!(20000.00),
                &["venturex"],
            ),
            card(
                "acct_venture_5961",
                "Venture",
                "5961",
                dec!(1204.88),
                dec!(8795.12),
                dec!(10000.00),
                &["venture"],
            ),
            Account {
                id: "acct_360checking_1960".to_string(),
                name: "360 Checking".to_string(),
                kind: AccountKind::Checking,
                last4: "1960".to_string(),
                balance: dec!(5342.19),
                currency: "USD".to_string(),
                status: AccountStatus::Active,
                locked: false,
                available_credit: None,
                credit_limit: None,
                aliases: vec!["360".to_string(), "checking".to_string()],
            },
        ];

        let mut transactions = IndexMap::new();
        transactions.insert(
            "acct_venturex_5660".to_string(),
            vec![
                txn("txn_001", FEB_18, "Delta Airlines", dec!(-342.50), "Travel"),
                txn("txn_002", FEB_17, "Whole Foods Market", dec!(-87.23), "Groceries"),
                txn("txn_003", FEB_16, "Capital One Travel Portal", dec!(-520.00), "Travel"),
                txn("txn_004", FEB_15, "Netflix", dec!(-15.49), "Streaming"),
                txn("txn_005", FEB_14, "Nobu Restaurant", dec!(-210.80), "Dining"),
            ],
        );
        transactions.insert(
            "acct_venture_5961".to_string(),
            vec![
                txn("txn_101", FEB_18, "Amazon", dec!(-134.99), "Shopping"),
                txn("txn_102", FEB_17, "Shell Gas Station", dec!(-62.45), "Gas"),
                txn("txn_103", FEB_16, "Starbucks", dec!(-7.85), "Dining"),
                txn("txn_104", FEB_15, "Target", dec!(-94.12), "Shopping"),
                txn("txn_105", FEB_14, "Spotify", dec!(-10.99), "Streaming"),
            ],
        );
        transactions.insert(
            "acct_360checking_1960".to_string(),
            vec![
                txn("txn_201", FEB_18, "Direct Deposit - Payroll", dec!(3200.00), "Income"),
                txn("txn_202", FEB_17, "Rent Payment - Zelle", dec!(-1850.00), "Housing"),
                txn("txn_203", FEB_16, "Venmo Transfer", dec!(-45.00), "Transfer"),
                txn("txn_204", FEB_15, "ATM Withdrawal", dec!(-200.00), "Cash"),
                txn("txn_205", FEB_14, "Utility Bill - AutoPay", dec!(-123.50), "Utilities"),
            ],
        );

        Self {
            accounts,
            transactions,
        }
    }
}

fn card(
    id: &str,
    name: &str,
    last4: &str,
    balance: Decimal,
    available_credit: Decimal,
    credit_limit: Decimal,
    aliases: &[&str],
) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        kind: AccountKind::CreditCard,
        last4: last4.to_string(),
        balance,
        currency: "USD".to_string(),
        status: AccountStatus::Active,
        locked: false,
        available_credit: Some(available_credit),
        credit_limit: Some(credit_limit),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

const FEB_14: NaiveDate = feb_2026(14);
const FEB_15: NaiveDate = feb_2026(15);
const FEB_16: NaiveDate = feb_2026(16);
const FEB_17: NaiveDate = feb_2026(17);
const FEB_18: NaiveDate = feb_2026(18);

/// Demo posting date; an out-of-range day fails const evaluation
const fn feb_2026(day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(2026, 2, day) {
        Some(date) => date,
        None => panic!("invalid demo posting day"),
    }
}

/// A posted demo transaction
fn txn(id: &str, date: NaiveDate, merchant: &str, amount: Decimal, category: &str) -> Transaction {
    Transaction {
        id: id.to_string(),
        date,
        merchant: merchant.to_string(),
        amount,
        category: category.to_string(),
        status: TransactionStatus::Posted,
    }
}
