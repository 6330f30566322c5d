//! MCP tool definitions for `tools/list`

use ledger_core::Account;
use serde_json::{json, Map};

use super::dispatcher::{ToolKind, DEFAULT_TRANSACTION_LIMIT, MAX_TRANSACTION_LIMIT};
use crate::protocol::{McpInputSchema, McpTool};

/// Builds tool definitions whose descriptions name the accounts on offer
pub struct ToolCatalog;

impl ToolCatalog {
    /// Create a new tool catalog
    pub fn new() -> Self {
        Self
    }

    /// Definitions for every tool, described against the given accounts
    pub fn generate_tools(&self, accounts: &[Account]) -> Vec<McpTool> {
        ToolKind::ALL
            .iter()
            .map(|kind| self.generate_tool(*kind, accounts))
            .collect()
    }

    /// Definition for a single tool
    pub fn generate_tool(&self, kind: ToolKind, accounts: &[Account]) -> McpTool {
        McpTool {
            name: kind.name().to_string(),
            description: Some(self.build_description(kind, accounts)),
            input_schema: self.build_input_schema(kind, accounts),
        }
    }

    fn build_description(&self, kind: ToolKind, accounts: &[Account]) -> String {
        let cards = Self::names(accounts.iter().filter(|a| a.is_card()));

        match kind {
            ToolKind::GetBalance => format!(
                "Get the current balance for one or all accounts. Available accounts: {}. \
                 Omit the account parameter to get all balances at once.",
                Self::names(accounts.iter())
            ),
            ToolKind::GetTransactions => {
                "Get recent transactions for a specific account.".to_string()
            }
            ToolKind::LockCard => format!(
                "Lock a credit card to prevent new purchases. Only applies to credit cards ({}). \
                 Does not apply to checking accounts.",
                cards
            ),
            ToolKind::UnlockCard => format!(
                "Unlock a previously locked credit card. Only applies to credit cards ({}). \
                 Does not apply to checking accounts.",
                cards
            ),
        }
    }

    fn build_input_schema(&self, kind: ToolKind, accounts: &[Account]) -> McpInputSchema {
        let mut properties = Map::new();

        let examples = match kind {
            ToolKind::GetBalance | ToolKind::GetTransactions => Self::examples(accounts.iter()),
            ToolKind::LockCard | ToolKind::UnlockCard => {
                Self::examples(accounts.iter().filter(|a| a.is_card()))
            }
        };

        let account_description = match kind {
            ToolKind::GetBalance => format!(
                "Account identifier. Examples: {}. Omit to get all accounts.",
                examples
            ),
            ToolKind::GetTransactions => format!("Account identifier. Examples: {}.", examples),
            ToolKind::LockCard => format!("Card to lock. Examples: {}.", examples),
            ToolKind::UnlockCard => format!("Card to unlock. Examples: {}.", examples),
        };

        properties.insert(
            "account".to_string(),
            json!({ "type": "string", "description": account_description }),
        );

        if kind == ToolKind::GetTransactions {
            properties.insert(
                "limit".to_string(),
                json!({
                    "type": "number",
                    "description": format!(
                        "Number of transactions to return. Default: {}. Max: {}.",
                        DEFAULT_TRANSACTION_LIMIT, MAX_TRANSACTION_LIMIT
                    ),
                }),
            );
        }

        let required = match kind {
            ToolKind::GetBalance => None,
            _ => Some(vec!["account".to_string()]),
        };

        McpInputSchema {
            properties: Some(properties),
            required,
            ..Default::default()
        }
    }

    /// "Venture X (x5660), Venture (x5961)"
    fn names<'a>(accounts: impl Iterator<Item = &'a Account>) -> String {
        accounts
            .map(|a| format!("{} (x{})", a.name, a.last4))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// "'Venture X', '5660', 'Venture', '5961'"
    fn examples<'a>(accounts: impl Iterator<Item = &'a Account>) -> String {
        accounts
            .flat_map(|a| [format!("'{}'", a.name), format!("'{}'", a.last4)])
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::LedgerSnapshot;

    fn tools() -> Vec<McpTool> {
        ToolCatalog::new().generate_tools(&LedgerSnapshot::demo().accounts)
    }

    #[test]
    fn test_generates_every_tool() {
        let names: Vec<_> = tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            ["get_balance", "get_transactions", "lock_card", "unlock_card"]
        );
    }

    #[test]
    fn test_required_arguments() {
        let tools = tools();
        assert!(tools[0].input_schema.required.is_none());
        for tool in &tools[1..] {
            assert_eq!(tool.input_schema.required, Some(vec!["account".to_string()]));
        }
    }

    #[test]
    fn test_descriptions_name_accounts() {
        let tools = tools();
        let balance = tools[0].description.as_deref().unwrap();
        assert!(balance.contains("360 Checking (x1960)"));

        let lock = tools[2].description.as_deref().unwrap();
        assert!(lock.contains("Venture X (x5660), Venture (x5961)"));
        assert!(!lock.contains("360 Checking"));
    }

    #[test]
    fn test_limit_only_on_transactions() {
        let tools = tools();
        let has_limit: Vec<_> = tools
            .iter()
            .map(|t| t.input_schema.properties.as_ref().unwrap().contains_key("limit"))
            .collect();
        assert_eq!(has_limit, [false, true, false, false]);

        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(value[1]["inputSchema"]["properties"]["limit"]["type"], "number");
        assert_eq!(value[0]["inputSchema"]["type"], "object");
    }
}
