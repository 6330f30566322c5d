//! Account and transaction data types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    CreditCard,
    Checking,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Checking => "checking",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Locked,
}

/// An account in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account id (e.g. "acct_venturex_5660")
    pub id: String,
    /// Display name
    pub name: String,
    /// Account kind
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// Last four digits of the account or card number
    pub last4: String,
    /// Current balance
    pub balance: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Reported status, kept in step with `locked`
    #[serde(default)]
    pub status: AccountStatus,
    /// Lock flag, kept in step with `status`
    #[serde(default)]
    pub locked: bool,
    /// Available credit (credit cards only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_credit: Option<Decimal>,
    /// Credit limit (credit cards only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<Decimal>,
    /// Free-form tokens a caller may use to name this account
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Account {
    /// Whether this account can be locked and unlocked
    pub fn is_card(&self) -> bool {
        self.kind == AccountKind::CreditCard
    }

    /// Set the lock flag and the status together
    pub(crate) fn apply_lock(&mut self, locked: bool) {
        self.locked = locked;
        self.status = if locked {
            AccountStatus::Locked
        } else {
            AccountStatus::Active
        };
    }

    /// `locked` and `status` agree with each other
    pub fn is_consistent(&self) -> bool {
        self.locked == (self.status == AccountStatus::Locked)
    }

    /// One-line description used in "available accounts" listings
    pub fn listing(&self) -> String {
        format!("• {} ({}) ending in {}", self.name, self.kind, self.last4)
    }

    /// Caller-facing summary of this account
    pub fn summary(&self) -> AccountSummary {
        let (available_credit, credit_limit) = if self.is_card() {
            (self.available_credit, self.credit_limit)
        } else {
            (None, None)
        };

        AccountSummary {
            account_name: self.name.clone(),
            account_type: self.kind,
            last4: self.last4.clone(),
            balance: self.balance,
            currency: self.currency.clone(),
            status: self.status,
            locked: self.locked,
            available_credit,
            credit_limit,
        }
    }
}

/// Balance summary returned by `get_balance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_name: String,
    pub account_type: AccountKind,
    pub last4: String,
    pub balance: Decimal,
    pub currency: String,
    pub status: AccountStatus,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_credit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<Decimal>,
}

/// Posting status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Posted,
}

/// A single, immutable transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub merchant: String,
    /// Signed amount, negative for debits
    pub amount: Decimal,
    pub category: String,
    pub status: TransactionStatus,
}

/// Outcome of a lock or unlock request
#[derive(Debug, Clone, PartialEq)]
pub enum LockChange {
    /// The account moved to the requested state
    Changed(Account),
    /// The account was already in the requested state
    Unchanged(Account),
}

impl LockChange {
    pub fn account(&self) -> &Account {
        match self {
            Self::Changed(account) | Self::Unchanged(account) => account,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}
