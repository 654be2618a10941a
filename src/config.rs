//! Configuration module for the bridge client
//!
//! Loaded from TOML, optionally overlaid with environment variables, and
//! validated before any component is constructed from it.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::address::{hex_to_bytes, parse_pubkey, EvmAddress};
use crate::retry::RetryPolicy;
use crate::tx_builder::instructions::{Discriminator, Discriminators, DISCRIMINATOR_LEN};

/// Configuration loading/validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Main bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Source chain (Solana) programs and RPC
    pub source: SourceConfig,

    /// Target chain (EVM) contracts and RPC
    pub target: TargetConfig,

    /// Relay payment settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Price quote API settings
    pub quote: QuoteConfig,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Broadcast/confirmation settings
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Optional discriminator overrides (16 hex chars each)
    #[serde(default)]
    pub discriminators: DiscriminatorOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Solana RPC endpoint
    pub rpc_url: String,

    /// Commitment level used for reads and confirmation
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Bridge program id (base58)
    pub bridge_program_id: String,

    /// Account collecting bridge gas fees (base58)
    pub gas_fee_receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// EVM JSON-RPC endpoint
    pub rpc_url: String,

    /// Bridge contract exposing address prediction
    pub bridge_contract: String,

    /// Account that executes swaps on behalf of bridged users
    pub execution_account: String,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Attach a relay payment when the relayer is configured on-chain
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Relayer program id (base58)
    #[serde(default)]
    pub relayer_program_id: Option<String>,

    /// Account receiving relay fees (base58)
    #[serde(default)]
    pub gas_fee_receiver: Option<String>,

    /// Gas limit paid for on the target chain
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            relayer_program_id: None,
            gas_fee_receiver: None,
            gas_limit: default_gas_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Price API base URL
    pub api_url: String,

    /// Optional API key, sent as `x-api-key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bridged source asset as a token on the target chain
    pub source_token: String,

    /// Decimals of the source asset (9 for lamports)
    #[serde(default = "default_source_decimals")]
    pub source_decimals: u32,

    /// Slippage buffer applied to the final source amount (basis points)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Dust floor for the source amount
    #[serde(default = "default_min_source_amount")]
    pub min_source_amount: u64,

    /// Amplified re-quotes after an insufficient executable quote
    #[serde(default = "default_amplification_retries")]
    pub amplification_retries: u32,

    /// Quotes older than this must be refreshed before submission
    #[serde(default = "default_quote_max_age")]
    pub max_age_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay_ms, self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub confirm_poll_interval_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: default_confirm_timeout(),
            confirm_poll_interval_ms: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscriminatorOverrides {
    #[serde(default)]
    pub pay_for_relay: Option<String>,
    #[serde(default)]
    pub bridge_native: Option<String>,
    #[serde(default)]
    pub bridge_token: Option<String>,
}

// Default value functions
fn default_commitment() -> String { "confirmed".to_string() }
fn default_http_timeout() -> u64 { 15 }
fn default_true() -> bool { true }
fn default_gas_limit() -> u64 { 200_000 }
fn default_source_decimals() -> u32 { 9 }
fn default_slippage_bps() -> u16 { 500 }
fn default_min_source_amount() -> u64 { 10_000 }
fn default_amplification_retries() -> u32 { 1 }
fn default_quote_max_age() -> u64 { 30 }
fn default_max_attempts() -> u32 { 3 }
fn default_base_delay_ms() -> u64 { 1000 }
fn default_max_delay_ms() -> u64 { 8000 }
fn default_confirm_timeout() -> u64 { 60 }
fn default_poll_interval() -> u64 { 500 }

fn pubkey_field(name: &str, value: &str) -> Result<Pubkey, ConfigError> {
    parse_pubkey(value).map_err(|e| ConfigError::ValidationError(format!("{}: {}", name, e)))
}

fn evm_field(name: &str, value: &str) -> Result<EvmAddress, ConfigError> {
    EvmAddress::from_str(value)
        .map_err(|e| ConfigError::ValidationError(format!("{}: {}", name, e)))
}

fn discriminator_field(name: &str, value: &str) -> Result<Discriminator, ConfigError> {
    let bytes = hex_to_bytes(value)
        .map_err(|e| ConfigError::ValidationError(format!("{}: {}", name, e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        ConfigError::ValidationError(format!(
            "{}: discriminator must be {} bytes",
            name, DISCRIMINATOR_LEN
        ))
    })
}

fn http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{}: invalid URL format: {}",
            name, value
        )))
    }
}

impl SourceConfig {
    pub fn bridge_program(&self) -> Result<Pubkey, ConfigError> {
        pubkey_field("source.bridge_program_id", &self.bridge_program_id)
    }

    pub fn gas_fee_receiver(&self) -> Result<Pubkey, ConfigError> {
        pubkey_field("source.gas_fee_receiver", &self.gas_fee_receiver)
    }

    pub fn commitment(
        &self,
    ) -> Result<solana_sdk::commitment_config::CommitmentConfig, ConfigError> {
        use solana_sdk::commitment_config::CommitmentConfig;
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(ConfigError::ValidationError(format!(
                "source.commitment: unknown level '{}'",
                other
            ))),
        }
    }
}

impl TargetConfig {
    pub fn bridge_contract(&self) -> Result<EvmAddress, ConfigError> {
        evm_field("target.bridge_contract", &self.bridge_contract)
    }

    pub fn execution_account(&self) -> Result<EvmAddress, ConfigError> {
        evm_field("target.execution_account", &self.execution_account)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RelayConfig {
    /// Relayer program and fee receiver, when relaying is enabled and configured
    pub fn accounts(&self) -> Result<Option<(Pubkey, Pubkey)>, ConfigError> {
        if !self.enabled {
            return Ok(None);
        }
        match (&self.relayer_program_id, &self.gas_fee_receiver) {
            (Some(program), Some(receiver)) => Ok(Some((
                pubkey_field("relay.relayer_program_id", program)?,
                pubkey_field("relay.gas_fee_receiver", receiver)?,
            ))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::ValidationError(
                "relay.relayer_program_id and relay.gas_fee_receiver must be set together"
                    .to_string(),
            )),
        }
    }
}

impl QuoteConfig {
    pub fn source_token(&self) -> Result<EvmAddress, ConfigError> {
        evm_field("quote.source_token", &self.source_token)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DiscriminatorOverrides {
    /// Defaults with any configured overrides applied
    pub fn resolve(&self) -> Result<Discriminators, ConfigError> {
        let mut out = Discriminators::default();
        if let Some(v) = &self.pay_for_relay {
            out.pay_for_relay = discriminator_field("discriminators.pay_for_relay", v)?;
        }
        if let Some(v) = &self.bridge_native {
            out.bridge_native = discriminator_field("discriminators.bridge_native", v)?;
        }
        if let Some(v) = &self.bridge_token {
            out.bridge_token = discriminator_field("discriminators.bridge_token", v)?;
        }
        Ok(out)
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| {
                ConfigError::IoError(format!("Failed to read config file {}: {}", path, e))
            })?;
        let config: BridgeConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    ///
    /// Recognized: `SOLBRIDGE_SOURCE_RPC_URL`, `SOLBRIDGE_TARGET_RPC_URL`,
    /// `SOLBRIDGE_QUOTE_API_KEY`.
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SOLBRIDGE_SOURCE_RPC_URL") {
            self.source.rpc_url = url;
        }
        if let Ok(url) = std::env::var("SOLBRIDGE_TARGET_RPC_URL") {
            self.target.rpc_url = url;
        }
        if let Ok(key) = std::env::var("SOLBRIDGE_QUOTE_API_KEY") {
            self.quote.api_key = Some(key);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        http_url("source.rpc_url", &self.source.rpc_url)?;
        http_url("target.rpc_url", &self.target.rpc_url)?;
        http_url("quote.api_url", &self.quote.api_url)?;

        self.source.bridge_program()?;
        self.source.gas_fee_receiver()?;
        self.source.commitment()?;
        self.target.bridge_contract()?;
        self.target.execution_account()?;
        self.relay.accounts()?;
        self.quote.source_token()?;
        self.discriminators.resolve()?;

        if self.quote.slippage_bps >= 10_000 {
            return Err(ConfigError::ValidationError(
                "quote.slippage_bps must be below 10000".to_string(),
            ));
        }
        if self.quote.source_decimals > 18 {
            return Err(ConfigError::ValidationError(
                "quote.source_decimals must be at most 18".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        if self.submission.confirm_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "submission.confirm_poll_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
