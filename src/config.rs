use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::{Address, address};
use dotenv::dotenv;
use envsubst::substitute;
use serde::Deserialize;

use crate::service::ServiceError;

/// Prefixes of environment variables that may be interpolated into the YAML file.
const ENV_PREFIXES: [&str; 3] = ["RPC_", "WALLET_", "LAUNCHPAD_"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: Network,
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub contracts: ContractOverrides,
}

impl Config {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        dotenv().ok();

        let path = path.as_ref();
        let file_content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let env_vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| ENV_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))
            .collect();

        Self::from_yaml_str(&file_content, &env_vars)
    }

    /// Parses a YAML document after substituting `${VAR}` references from `env_vars`.
    pub fn from_yaml_str(
        content: &str,
        env_vars: &HashMap<String, String>,
    ) -> Result<Self, ServiceError> {
        let interpolated = substitute(content, env_vars).map_err(|e| {
            ServiceError::Configuration(format!("failed to substitute environment variables: {e}"))
        })?;

        serde_yaml::from_str(&interpolated)
            .map_err(|e| ServiceError::Configuration(format!("failed to parse YAML: {e}")))
    }

    /// Builds a read-only configuration with default tuning for the given network.
    pub fn from_parts(network: Network, rpc_url: impl Into<String>) -> Self {
        Self {
            network,
            rpc: RpcConfig {
                url: rpc_url.into(),
                ws_url: None,
                timeout_secs: default_timeout_secs(),
                max_retries: default_rpc_max_retries(),
                retry_backoff_ms: default_retry_backoff_ms(),
            },
            wallet: WalletConfig::default(),
            indexer: IndexerConfig::default(),
            stream: StreamConfig::default(),
            contracts: ContractOverrides::default(),
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.rpc.ws_url = Some(ws_url.into());
        self
    }

    pub fn with_private_key(mut self, private_key: impl Into<String>) -> Self {
        self.wallet.private_key = private_key.into();
        self
    }

    /// Network contract table with any configured overrides applied.
    pub fn contracts(&self) -> ContractAddresses {
        self.contracts.apply(self.network.contracts())
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    /// The WebSocket URL, or a configuration error naming the capability that needs it.
    pub fn require_ws_url(&self, capability: &str) -> Result<&str, ServiceError> {
        self.rpc
            .ws_url
            .as_deref()
            .filter(|url| !is_unset(url))
            .ok_or_else(|| {
                ServiceError::Configuration(format!("{capability} requires rpc.ws_url to be set"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Testnet => 10143,
            Network::Mainnet => 143,
        }
    }

    pub fn contracts(self) -> ContractAddresses {
        match self {
            Network::Testnet => ContractAddresses {
                bonding_curve_router: address!("865054F0F6A288adaAc30261731361EA7E908003"),
                curve: address!("1228b0dc9481C11D3071E7A924B794CfB038994e"),
                lens: address!("B056d79CA5257589692699a46623F901a3BB76f1"),
                dex_router: address!("5D4a4f430cA3B1b2dB86B9cFE48a5316800F5fb2"),
                dex_factory: address!("d0a37cf728CE2902eB8d4F6f2afc76854048253b"),
                wmon: address!("760AfE86e5de5fa0Ee542fc7B7B713e1c5425701"),
            },
            Network::Mainnet => ContractAddresses {
                bonding_curve_router: address!("6F6B8F1a20703309951a5127c45B49b1CD981A22"),
                curve: address!("A7283d07812a02AFB7C09B60f8896bCEA3F90aCE"),
                lens: address!("7e78A8DE94f21804F7a17F4E8BF9EC2c872187ea"),
                dex_router: address!("0B79d71AE99528D1dB24A4148b5f4F865cc2b137"),
                dex_factory: address!("6B5F564339DbAD6b780249827f2198a841FEB7F3"),
                wmon: address!("3bd359C1119dA7Da1D913D1C4D2B7c461115433A"),
            },
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Testnet => f.write_str("testnet"),
            Network::Mainnet => f.write_str("mainnet"),
        }
    }
}

/// Protocol contract addresses for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub bonding_curve_router: Address,
    pub curve: Address,
    pub lens: Address,
    pub dex_router: Address,
    pub dex_factory: Address,
    pub wmon: Address,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractOverrides {
    pub bonding_curve_router: Option<Address>,
    pub curve: Option<Address>,
    pub lens: Option<Address>,
    pub dex_router: Option<Address>,
    pub dex_factory: Option<Address>,
    pub wmon: Option<Address>,
}

impl ContractOverrides {
    fn apply(&self, base: ContractAddresses) -> ContractAddresses {
        ContractAddresses {
            bonding_curve_router: self
                .bonding_curve_router
                .unwrap_or(base.bonding_curve_router),
            curve: self.curve.unwrap_or(base.curve),
            lens: self.lens.unwrap_or(base.lens),
            dex_router: self.dex_router.unwrap_or(base.dex_router),
            dex_factory: self.dex_factory.unwrap_or(base.dex_factory),
            wmon: self.wmon.unwrap_or(base.wmon),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_rpc_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: String,
}

impl WalletConfig {
    pub fn has_key(&self) -> bool {
        !is_unset(&self.private_key)
    }
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.has_key() { "<redacted>" } else { "" };
        f.debug_struct("WalletConfig")
            .field("private_key", &key)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_indexer_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_indexer_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Filter polling over HTTP (`eth_newFilter` + `eth_getFilterChanges`).
    Http,
    /// Push subscription over WebSocket (`eth_subscribe("logs")`).
    #[default]
    Websocket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_base_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Empty values and `${VAR}` placeholders left behind by a missing variable count as unset.
fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.starts_with("${")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rpc_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_batch_size() -> u64 {
    100
}

fn default_max_concurrency() -> usize {
    4
}

fn default_indexer_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}
