//! Gateway configuration, read once from YAML at startup.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connect::DialConfig;
use crate::policy::RetryConfig;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config for '{chain}': {reason}")]
    Invalid { chain: String, reason: String },
}

/// Inbound server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: String,
}

fn default_port() -> String {
    "8189".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// One node endpoint, with optional HTTP basic-auth credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcEndpoint {
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_user: String,
    #[serde(default)]
    pub rpc_pass: String,
}

impl RpcEndpoint {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Credentials, when a user name is configured.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        if self.rpc_user.is_empty() {
            None
        } else {
            Some((self.rpc_user.clone(), self.rpc_pass.clone()))
        }
    }
}

/// Dial policy in config-file units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_attempts() -> u32 { crate::policy::DEFAULT_MAX_ATTEMPTS }
fn default_initial_backoff_ms() -> u64 { 100 }
fn default_max_backoff_ms() -> u64 { 10_000 }
fn default_probe_timeout_ms() -> u64 { 5_000 }
fn default_connect_timeout_ms() -> u64 { 5_000 }

impl Default for DialSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl DialSettings {
    pub fn to_dial_config(&self) -> DialConfig {
        DialConfig {
            retry: RetryConfig {
                max_attempts: self.attempts,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                ..RetryConfig::default()
            },
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

/// Per-network node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node endpoints; the first one is dialed.
    #[serde(default)]
    pub rpcs: Vec<RpcEndpoint>,
    /// Blocks required before a block counts as final.
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub data_api_url: String,
    #[serde(default)]
    pub data_api_key: String,
    #[serde(default)]
    pub data_api_token: String,
    /// Per-call deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// Whether the node handles multi-unit batch calls. Networks that reject
    /// or mishandle large batches get the grouped-parallel strategy instead.
    #[serde(default = "bool_true")]
    pub supports_batch: bool,
    /// Heights per worker in the grouped-parallel range strategy.
    #[serde(default = "default_range_group_size")]
    pub range_group_size: usize,
    /// Largest number of heights one range request may cover.
    #[serde(default = "default_max_range")]
    pub max_range: u64,
    #[serde(default)]
    pub dial: DialSettings,
}

fn default_timeout_secs() -> u64 { 10 }
fn bool_true() -> bool { true }
fn default_range_group_size() -> usize { 100 }
fn default_max_range() -> u64 { 10_000 }

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpcs: vec![],
            confirmations: 0,
            data_api_url: String::new(),
            data_api_key: String::new(),
            data_api_token: String::new(),
            timeout: default_timeout_secs(),
            supports_batch: true,
            range_group_size: default_range_group_size(),
            max_range: default_max_range(),
            dial: DialSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Settings for a single endpoint with every other value defaulted.
    pub fn single(rpc_url: impl Into<String>) -> Self {
        Self {
            rpcs: vec![RpcEndpoint::new(rpc_url)],
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// The endpoint to dial.
    pub fn primary_rpc(&self) -> Option<&RpcEndpoint> {
        self.rpcs.first()
    }

    fn validate(&self, chain: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            chain: chain.to_string(),
            reason: reason.to_string(),
        };
        if self.primary_rpc().map_or(true, |rpc| rpc.rpc_url.is_empty()) {
            return Err(invalid("at least one rpc_url is required"));
        }
        if self.timeout == 0 {
            return Err(invalid("timeout must be greater than zero"));
        }
        if self.range_group_size == 0 {
            return Err(invalid("range_group_size must be greater than zero"));
        }
        if self.max_range == 0 {
            return Err(invalid("max_range must be greater than zero"));
        }
        if self.dial.attempts == 0 {
            return Err(invalid("dial.attempts must be greater than zero"));
        }
        Ok(())
    }
}

/// Logging settings consumed by the binary's tracing setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: component_name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Network name passed to adaptors (e.g. "mainnet").
    #[serde(default)]
    pub network: String,
    /// Chains to bring up at startup.
    #[serde(default)]
    pub chains: Vec<String>,
    /// chain slug → node settings
    #[serde(default)]
    pub wallet_node: HashMap<String, NodeConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

impl GatewayConfig {
    /// Read and validate a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Node settings for `chain` (case-insensitive).
    pub fn node(&self, chain: &str) -> Option<&NodeConfig> {
        self.wallet_node
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(chain))
            .map(|(_, node)| node)
    }

    /// Every enabled chain must have valid node settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for chain in &self.chains {
            let node = self.node(chain).ok_or_else(|| ConfigError::Invalid {
                chain: chain.clone(),
                reason: "no wallet_node entry".into(),
            })?;
            node.validate(chain)?;
        }
        Ok(())
    }
}
