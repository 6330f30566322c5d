//! Accounts, transactions and the account store

mod resolve;
mod store;
mod types;

pub use resolve::{normalize, resolve};
pub use store::AccountStore;
pub use types::{
    Account, AccountKind, AccountStatus, AccountSummary, LockChange, Transaction,
    TransactionStatus,
};
