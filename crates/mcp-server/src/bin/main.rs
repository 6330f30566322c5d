//! Eno MCP server - exposes the account tools over streamable HTTP and legacy SSE

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use eno_mcp_server::{Gateway, GatewayConfig};
use ledger_core::{AccountStore, LedgerSnapshot};

/// Eno MCP server - banking tools for MCP clients
#[derive(Parser, Debug)]
#[command(name = "eno-mcp-server")]
#[command(version)]
#[command(about = "Eno MCP server - account balances, transactions and card locks via MCP")]
struct Args {
    /// Port for the HTTP server
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "ENO_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Ledger snapshot (JSON); the built-in demo ledger is used when absent
    #[arg(long, env = "ENO_LEDGER_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Keep-alive interval on legacy SSE streams, in seconds
    #[arg(long, env = "ENO_HEARTBEAT_SECS", default_value = "15")]
    heartbeat_secs: u64,

    /// Close streamable-HTTP sessions idle this long, in seconds (0 disables)
    #[arg(long, env = "ENO_SESSION_IDLE_SECS", default_value = "1800")]
    session_idle_secs: u64,
}

impl Args {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.host.clone(),
            port: self.port,
            heartbeat: Duration::from_secs(self.heartbeat_secs.max(1)),
            session_idle: (self.session_idle_secs > 0)
                .then(|| Duration::from_secs(self.session_idle_secs)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let store = match &args.snapshot {
        Some(path) => {
            let snapshot = LedgerSnapshot::load(path)
                .await
                .map_err(|e| format!("Failed to load ledger snapshot {}: {}", path.display(), e))?;
            AccountStore::new(snapshot)?
        }
        None => AccountStore::demo(),
    };
    info!("Ledger ready with {} accounts", store.len().await);

    let gateway = Gateway::new(Arc::new(store), args.gateway_config());
    gateway.run().await
}
