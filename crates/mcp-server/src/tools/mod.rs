//! Tool catalog and dispatch

mod catalog;
mod dispatcher;

pub use catalog::ToolCatalog;
pub use dispatcher::{
    CardUpdate, ToolBody, ToolDispatcher, ToolKind, ToolRequest, ToolResult, TransactionPage,
    DEFAULT_TRANSACTION_LIMIT, MAX_TRANSACTION_LIMIT,
};
