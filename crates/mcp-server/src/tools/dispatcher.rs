//! Dispatch tool calls against the account store

use ledger_core::{
    Account, AccountStatus, AccountStore, AccountSummary, LedgerError, Result, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transactions returned when the caller gives no limit
pub const DEFAULT_TRANSACTION_LIMIT: usize = 5;

/// Largest page `get_transactions` will return
pub const MAX_TRANSACTION_LIMIT: usize = 20;

/// The tools this server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    GetBalance,
    GetTransactions,
    LockCard,
    UnlockCard,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        Self::GetBalance,
        Self::GetTransactions,
        Self::LockCard,
        Self::UnlockCard,
    ];

    /// Wire name of the tool
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBalance => "get_balance",
            Self::GetTransactions => "get_transactions",
            Self::LockCard => "lock_card",
            Self::UnlockCard => "unlock_card",
        }
    }

    /// Look a tool up by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tool invocation: `{tool, arguments}` (MCP's `name` is accepted for `tool`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    #[serde(alias = "name")]
    pub tool: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments: Some(arguments),
        }
    }
}

/// Outcome of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(flatten)]
    pub body: ToolBody,
}

impl ToolResult {
    pub fn ok(body: ToolBody) -> Self {
        Self {
            success: true,
            body,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            body: ToolBody::Error {
                error: error.into(),
            },
        }
    }

    /// Error text, if this is a failure
    pub fn error(&self) -> Option<&str> {
        match &self.body {
            ToolBody::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": e.to_string() })
        })
    }
}

/// Tool-specific payload, flattened next to `success`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolBody {
    Error { error: String },
    Balances { accounts: Vec<AccountSummary> },
    Balance(AccountSummary),
    Transactions(TransactionPage),
    Card(CardUpdate),
}

/// Payload of `get_transactions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    pub account_name: String,
    pub last4: String,
    pub transaction_count: usize,
    pub transactions: Vec<Transaction>,
}

/// Payload of `lock_card` and `unlock_card`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardUpdate {
    pub message: String,
    pub account_name: String,
    pub last4: String,
    pub locked: bool,
    pub status: AccountStatus,
}

/// Maps tool requests onto the account store
///
/// Holds no per-session state, so one dispatcher is shared by every session
/// on both transports.
pub struct ToolDispatcher {
    store: Arc<AccountStore>,
}

impl ToolDispatcher {
    /// Create a new tool dispatcher
    pub fn new(store: Arc<AccountStore>) -> Self {
        Self { store }
    }

    /// The store this dispatcher reads and mutates
    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    /// Run a tool. Never fails: errors come back as `success: false`.
    pub async fn invoke(&self, request: ToolRequest) -> ToolResult {
        let Some(kind) = ToolKind::from_name(&request.tool) else {
            warn!("Unknown tool requested: {}", request.tool);
            return ToolResult::failure(format!("Unknown tool: {}", request.tool));
        };

        debug!("Invoking tool: {}", kind);

        let outcome = match Arguments::parse(request.arguments) {
            Ok(args) => match kind {
                ToolKind::GetBalance => self.get_balance(&args).await,
                ToolKind::GetTransactions => self.get_transactions(&args).await,
                ToolKind::LockCard => self.set_card_lock(&args, true).await,
                ToolKind::UnlockCard => self.set_card_lock(&args, false).await,
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(body) => ToolResult::ok(body),
            Err(e) => {
                debug!("Tool {} failed: {}", kind, e);
                ToolResult::failure(e.to_string())
            }
        }
    }

    async fn get_balance(&self, args: &Arguments) -> Result<ToolBody> {
        match args.account()? {
            None => {
                let accounts = self.store.all().await;
                Ok(ToolBody::Balances {
                    accounts: accounts.iter().map(Account::summary).collect(),
                })
            }
            Some(query) => {
                let account = self.resolve(query, "Account").await?;
                Ok(ToolBody::Balance(account.summary()))
            }
        }
    }

    async fn get_transactions(&self, args: &Arguments) -> Result<ToolBody> {
        let Some(query) = args.account()? else {
            return Err(LedgerError::MissingArgument(format!(
                "Please specify an account.\nAvailable:\n{}",
                self.store.listing().await
            )));
        };
        let limit = args.limit()?;
        let account = self.resolve(query, "Account").await?;

        let transactions = self.store.transactions(&account.id, limit).to_vec();

        Ok(ToolBody::Transactions(TransactionPage {
            account_name: account.name,
            last4: account.last4,
            transaction_count: transactions.len(),
            transactions,
        }))
    }

    async fn set_card_lock(&self, args: &Arguments, locked: bool) -> Result<ToolBody> {
        let Some(query) = args.account()? else {
            return Err(LedgerError::MissingArgument(format!(
                "Please specify a card.\n{}: {}",
                if locked { "Lockable" } else { "Unlockable" },
                self.card_list().await
            )));
        };
        let account = self.resolve(query, "Card").await?;

        let change = self.store.set_locked(&account.id, locked).await?;
        let account = change.account();
        let message = match (change.changed(), locked) {
            (true, true) => format!(
                "{} ending in {} has been locked. No new purchases can be made until unlocked.",
                account.name, account.last4
            ),
            (true, false) => format!(
                "{} ending in {} has been unlocked and is ready to use.",
                account.name, account.last4
            ),
            (false, true) => format!("{} ending in {} is already locked.", account.name, account.last4),
            (false, false) => format!("{} ending in {} is already active.", account.name, account.last4),
        };

        if change.changed() {
            info!("{}", message);
        }

        Ok(ToolBody::Card(CardUpdate {
            message,
            account_name: account.name.clone(),
            last4: account.last4.clone(),
            locked: account.locked,
            status: account.status,
        }))
    }

    async fn resolve(&self, query: &str, label: &'static str) -> Result<Account> {
        match self.store.resolve(query).await {
            Some(account) => Ok(account),
            None => Err(LedgerError::AccountNotFound {
                label,
                query: query.to_string(),
                available: self.store.listing().await,
            }),
        }
    }

    /// "Venture X (5660), Venture (5961)"
    async fn card_list(&self) -> String {
        self.store
            .all()
            .await
            .iter()
            .filter(|a| a.is_card())
            .map(|a| format!("{} ({})", a.name, a.last4))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tool arguments with the lenient parsing callers expect
struct Arguments(Map<String, Value>);

impl Arguments {
    fn parse(arguments: Option<Value>) -> Result<Self> {
        match arguments {
            None | Some(Value::Null) => Ok(Self(Map::new())),
            Some(Value::Object(map)) => Ok(Self(map)),
            Some(_) => Err(LedgerError::InvalidArgument(
                "Arguments must be an object".to_string(),
            )),
        }
    }

    /// The `account` argument; empty strings count as absent
    fn account(&self) -> Result<Option<&str>> {
        match self.0.get("account") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(LedgerError::InvalidArgument(
                "account must be a string".to_string(),
            )),
        }
    }

    /// The `limit` argument, clamped to `0..=MAX_TRANSACTION_LIMIT`
    fn limit(&self) -> Result<usize> {
        let raw = match self.0.get("limit") {
            None | Some(Value::Null) => return Ok(DEFAULT_TRANSACTION_LIMIT),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        let raw = raw
            .filter(|n| !n.is_nan())
            .ok_or_else(|| LedgerError::InvalidArgument("limit must be a number".to_string()))?;

        Ok(raw.trunc().clamp(0.0, MAX_TRANSACTION_LIMIT as f64) as usize)
    }
}
