use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::command::{TransferFlags, TransferTemplate};
use crate::error::DistributorError;
use crate::logs::LogLayout;
use crate::retry::RetryPolicy;

/// Environment variables with this prefix override file values,
/// e.g. `DISTRIBUTOR_TOKEN_MINT`.
pub const ENV_PREFIX: &str = "DISTRIBUTOR";

/// Well-known RPC endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Cluster {
    Mainnet,
    Testnet,
    #[default]
    Devnet,
}

impl Cluster {
    pub fn url(self) -> &'static str {
        match self {
            Cluster::Mainnet => "https://api.mainnet-beta.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Unset values are written as null so `--init` lists every key.
    // RPC endpoint passed to the wallet tool; falls back to the selected cluster
    pub rpc_url: Option<String>,
    // Mint of the token being distributed
    pub token_mint: Option<String>,
    pub token_decimals: Option<u8>,
    // Total amount to distribute, can be given with --drop instead
    pub drop_amount: Option<f64>,
    pub transfer_program: String,
    pub wallet_program: String,
    pub log_dir: PathBuf,
    pub log_folder_prefix: String,
    pub success_log: String,
    pub failed_log: String,
    pub canceled_log: String,
    pub unconfirmed_log: String,
    pub detailed_log: String,
    pub retry_rate_limit: bool,
    pub rpc_retry_delay_secs: u64,
    pub rate_limit_retry_delay_secs: u64,
    pub fund_recipient: bool,
    pub allow_unfunded_recipient: bool,
    pub extra_transfer_flags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let layout = LogLayout::default();
        let retry = RetryPolicy::default();

        Self {
            rpc_url: None,
            token_mint: None,
            token_decimals: None,
            drop_amount: None,
            transfer_program: "spl-token".to_string(),
            wallet_program: "solana".to_string(),
            log_dir: layout.base_dir,
            log_folder_prefix: layout.folder_prefix,
            success_log: layout.success,
            failed_log: layout.failed,
            canceled_log: layout.canceled,
            unconfirmed_log: layout.unconfirmed,
            detailed_log: layout.detailed,
            retry_rate_limit: retry.retry_rate_limit,
            rpc_retry_delay_secs: retry.rpc_delay.as_secs(),
            rate_limit_retry_delay_secs: retry.rate_limit_delay.as_secs(),
            fund_recipient: false,
            allow_unfunded_recipient: false,
            extra_transfer_flags: Vec::new(),
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub rpc_url: Option<String>,
    pub cluster: Option<Cluster>,
    pub drop_amount: Option<f64>,
    pub retry_rate_limit: bool,
    pub fund_recipient: bool,
    pub allow_unfunded_recipient: bool,
}

/// Validated run configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub template: TransferTemplate,
    pub wallet_program: String,
    pub retry: RetryPolicy,
    pub logs: LogLayout,
    pub drop_amount: Option<f64>,
}

impl Config {
    /// Read the config file (missing file means defaults) and apply
    /// `DISTRIBUTOR_*` environment overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(config_path).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(config_path, content)?;
        Ok(())
    }

    /// Merge command line overrides and validate everything.
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings, DistributorError> {
        let endpoint = match (&overrides.rpc_url, overrides.cluster, &self.rpc_url) {
            (Some(url), _, _) => url.clone(),
            (None, Some(cluster), _) => cluster.url().to_string(),
            (None, None, Some(url)) => url.clone(),
            (None, None, None) => Cluster::default().url().to_string(),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| DistributorError::InvalidConfig(format!("invalid RPC url `{}`: {}", endpoint, e)))?;

        let mint = self
            .token_mint
            .as_deref()
            .filter(|mint| !mint.trim().is_empty())
            .ok_or_else(|| DistributorError::InvalidConfig("token_mint is not set".to_string()))?;
        let mint = Pubkey::from_str(mint.trim())
            .map_err(|e| DistributorError::InvalidConfig(format!("invalid token mint `{}`: {}", mint, e)))?;

        let decimals = self
            .token_decimals
            .ok_or_else(|| DistributorError::InvalidConfig("token_decimals is not set".to_string()))?;

        let drop_amount = overrides.drop_amount.or(self.drop_amount);
        if let Some(amount) = drop_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(DistributorError::InvalidDropAmount(amount));
            }
        }

        for (name, value) in [
            ("transfer_program", &self.transfer_program),
            ("wallet_program", &self.wallet_program),
        ] {
            if value.trim().is_empty() {
                return Err(DistributorError::InvalidConfig(format!("{} is empty", name)));
            }
        }

        Ok(Settings {
            template: TransferTemplate {
                program: self.transfer_program.clone(),
                mint,
                decimals,
                endpoint,
                flags: TransferFlags {
                    fund_recipient: self.fund_recipient || overrides.fund_recipient,
                    allow_unfunded_recipient: self.allow_unfunded_recipient
                        || overrides.allow_unfunded_recipient,
                    extra: self.extra_transfer_flags.clone(),
                },
            },
            wallet_program: self.wallet_program.clone(),
            retry: RetryPolicy {
                retry_rate_limit: self.retry_rate_limit || overrides.retry_rate_limit,
                rpc_delay: Duration::from_secs(self.rpc_retry_delay_secs),
                rate_limit_delay: Duration::from_secs(self.rate_limit_retry_delay_secs),
            },
            logs: LogLayout {
                base_dir: self.log_dir.clone(),
                folder_prefix: self.log_folder_prefix.clone(),
                success: self.success_log.clone(),
                failed: self.failed_log.clone(),
                canceled: self.canceled_log.clone(),
                unconfirmed: self.unconfirmed_log.clone(),
                detailed: self.detailed_log.clone(),
            },
            drop_amount,
        })
    }
}
