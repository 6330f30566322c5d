//! In-memory account store

use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::resolve;
use super::types::{Account, LockChange, Transaction};
use crate::error::{LedgerError, Result};
use crate::snapshot::LedgerSnapshot;

/// Account store seeded from a snapshot
///
/// Transaction history is immutable after construction. Account records
/// change only through [`AccountStore::set_locked`], which performs its
/// read-check-write under a single write guard so `locked` and `status`
/// never drift apart, whatever the interleaving of callers.
pub struct AccountStore {
    /// Accounts keyed by id, in resolution priority order
    accounts: RwLock<IndexMap<String, Account>>,
    /// Transaction history keyed by account id, most-recent-first
    transactions: IndexMap<String, Vec<Transaction>>,
}

impl AccountStore {
    /// Create a store from a snapshot, validating it first
    pub fn new(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.validate()?;
        Ok(Self::seed(snapshot))
    }

    /// Create a store holding the built-in demo ledger
    pub fn demo() -> Self {
        Self::seed(LedgerSnapshot::demo())
    }

    fn seed(snapshot: LedgerSnapshot) -> Self {
        let LedgerSnapshot {
            accounts,
            transactions,
        } = snapshot;

        info!("Account store loaded with {} accounts", accounts.len());

        Self {
            accounts: RwLock::new(
                accounts
                    .into_iter()
                    .map(|account| (account.id.clone(), account))
                    .collect(),
            ),
            transactions,
        }
    }

    /// Get an account by id
    pub async fn get(&self, id: &str) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts.get(id).cloned()
    }

    /// All accounts, in snapshot order
    pub async fn all(&self) -> Vec<Account> {
        let accounts = self.accounts.read().await;
        accounts.values().cloned().collect()
    }

    /// Number of accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether the store holds no accounts
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    /// Resolve a free-form identifier to an account
    pub async fn resolve(&self, identifier: &str) -> Option<Account> {
        let accounts = self.accounts.read().await;
        resolve::resolve(accounts.values(), identifier).cloned()
    }

    /// Bullet list of every account, for error messages
    pub async fn listing(&self) -> String {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .map(Account::listing)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Up to `limit` transactions for an account, most-recent-first
    pub fn transactions(&self, id: &str, limit: usize) -> &[Transaction] {
        match self.transactions.get(id) {
            Some(history) => &history[..limit.min(history.len())],
            None => &[],
        }
    }

    /// Lock or unlock a card
    ///
    /// Only credit cards can be locked; any other kind fails with
    /// `InvalidOperation` and is left untouched. Requesting the state the
    /// account is already in succeeds without a change.
    pub async fn set_locked(&self, id: &str, locked: bool) -> Result<LockChange> {
        let mut accounts = self.accounts.write().await;

        let account = accounts.get_mut(id).ok_or_else(|| LedgerError::AccountNotFound {
            label: "Card",
            query: id.to_string(),
            available: String::new(),
        })?;

        if !account.is_card() {
            return Err(LedgerError::InvalidOperation(format!(
                "{} is a {} account - only credit cards can be {}.",
                account.name,
                account.kind,
                if locked { "locked" } else { "unlocked" }
            )));
        }

        if account.locked == locked {
            debug!("Account {} already has locked={}", id, locked);
            return Ok(LockChange::Unchanged(account.clone()));
        }

        account.apply_lock(locked);
        info!(
            "Account {} {}",
            id,
            if locked { "locked" } else { "unlocked" }
        );

        Ok(LockChange::Changed(account.clone()))
    }
}
