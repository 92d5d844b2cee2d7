//! Command-line configuration.
//!
//! Values come from [`CliConfig::default`], then `HDVAULT_*` environment
//! variables, then explicit command-line flags.

use std::path::PathBuf;

use hdvault_core::constants::DEFAULT_RPC_PORT;

pub const ENV_WALLET: &str = "HDVAULT_WALLET";
pub const ENV_RPC_ENDPOINT: &str = "HDVAULT_RPC_ENDPOINT";
pub const ENV_LOG_LEVEL: &str = "HDVAULT_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "HDVAULT_LOG_FORMAT";

/// Resolved settings for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Wallet file to read and write.
    pub wallet_path: PathBuf,
    /// JSON-RPC endpoint of an Ethereum execution client.
    pub rpc_endpoint: String,
    /// Log filter used when `RUST_LOG` is unset (e.g. "warn", "hdvault_wallet=debug").
    pub log_level: String,
    /// "text" or "json".
    pub log_format: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let wallet_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hdvault")
            .join("wallet.dat");

        Self {
            wallet_path,
            rpc_endpoint: format!("http://127.0.0.1:{DEFAULT_RPC_PORT}"),
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl CliConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns. Empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_WALLET) {
            config.wallet_path = PathBuf::from(path);
        }
        if let Some(endpoint) = get(ENV_RPC_ENDPOINT) {
            config.rpc_endpoint = endpoint;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            config.log_format = format.to_lowercase();
        }
        config
    }

    /// Apply flags given on the command line.
    pub fn with_overrides(
        mut self,
        wallet: Option<PathBuf>,
        rpc_endpoint: Option<String>,
        log_level: Option<String>,
        log_format: Option<String>,
    ) -> Self {
        if let Some(wallet) = wallet {
            self.wallet_path = wallet;
        }
        if let Some(endpoint) = rpc_endpoint {
            self.rpc_endpoint = endpoint;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        if let Some(format) = log_format {
            self.log_format = format.to_lowercase();
        }
        self
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}
