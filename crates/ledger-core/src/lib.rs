//! # ledger-core
//!
//! In-memory account ledger for the Eno MCP server:
//! - Accounts and their read-only transaction history
//! - Free-form account resolution by alias or last-four digits
//! - Atomic card lock/unlock
//! - Ledger snapshots (built-in demo data or a JSON file)

pub mod account;
pub mod error;
pub mod snapshot;

pub use account::{
    Account, AccountKind, AccountStatus, AccountStore, AccountSummary, LockChange, Transaction,
    TransactionStatus,
};
pub use error::{LedgerError, Result};
pub use snapshot::LedgerSnapshot;
