//! Wallet configuration
//!
//! Settings are loaded once at startup. Every missing or malformed required
//! value fails with [`Error::Configuration`] before any signing round runs.

use crate::chain::ChainId;
use crate::types::parse_address;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// EntryPoint v0.7 contract, deployed at the same address on every chain
pub const ENTRY_POINT_V07: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Default signing gateway (Porter on the lynx test network)
pub const DEFAULT_GATEWAY_URL: &str = "https://porter-lynx.nucypher.io";

/// Default bundler method for reading gas price tiers
pub const DEFAULT_GAS_PRICE_METHOD: &str = "pimlico_getUserOperationGasPrice";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which generation of the signing-request protocol to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    /// Per-member encrypted requests under session-derived secrets
    #[default]
    Encrypted,
    /// Deprecated plaintext requests, kept for older gateways
    LegacyPlaintext,
}

impl FromStr for ProtocolMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "encrypted" => Ok(ProtocolMode::Encrypted),
            "legacy" | "legacy_plaintext" | "plaintext" => Ok(ProtocolMode::LegacyPlaintext),
            other => Err(Error::Configuration(format!(
                "unknown signing protocol: {}",
                other
            ))),
        }
    }
}

/// Account-abstraction version tag sent to cohort members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AaVersion {
    /// MetaMask delegation toolkit accounts
    #[default]
    #[serde(rename = "mdt")]
    Mdt,
    /// Plain EntryPoint v0.8 accounts
    #[serde(rename = "0.8.0")]
    V08,
}

impl AaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            AaVersion::Mdt => "mdt",
            AaVersion::V08 => "0.8.0",
        }
    }
}

impl fmt::Display for AaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a threshold-signed smart wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Chain the smart accounts live on
    pub chain_id: ChainId,
    /// JSON-RPC endpoint for balance, code and nonce reads
    pub rpc_url: String,
    /// Bundler JSON-RPC endpoint
    pub bundler_url: String,
    /// Provider-specific gas price method
    pub gas_price_method: String,
    /// Signing gateway base URL
    pub gateway_url: String,
    /// Signer cohort to request signatures from
    pub cohort_id: u64,
    /// Partial signatures required to form a combined signature
    pub threshold: usize,
    /// Signers requested by the legacy discovery call
    pub cohort_size: usize,
    /// EntryPoint contract
    pub entry_point: Address,
    /// Factory deploying accounts through CREATE2
    #[serde(default)]
    pub account_factory: Option<Address>,
    /// Hash of the account init code used in CREATE2
    #[serde(default)]
    pub init_code_hash: Option<B256>,
    /// Owner passed to `createAccount` when deploying
    #[serde(default)]
    pub account_owner: Option<Address>,
    /// Fixed smart account, bypassing per-user derivation
    #[serde(default)]
    pub smart_account: Option<Address>,
    /// Signing protocol generation
    #[serde(default)]
    pub protocol: ProtocolMode,
    /// Account-abstraction version tag
    #[serde(default)]
    pub aa_version: AaVersion,
    /// Timeout applied to every network request
    pub request_timeout_secs: u64,
}

impl WalletConfig {
    /// Base Sepolia deployment defaults
    pub fn base_sepolia(cohort_id: u64, bundler_url: impl Into<String>) -> Self {
        Self {
            chain_id: ChainId::BASE_SEPOLIA,
            rpc_url: "https://sepolia.base.org".to_string(),
            bundler_url: bundler_url.into(),
            gas_price_method: DEFAULT_GAS_PRICE_METHOD.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            cohort_id,
            threshold: crate::DEFAULT_THRESHOLD,
            cohort_size: 3,
            entry_point: ENTRY_POINT_V07,
            account_factory: None,
            init_code_hash: None,
            account_owner: None,
            smart_account: None,
            protocol: ProtocolMode::Encrypted,
            aa_version: AaVersion::Mdt,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cohort_id = get("COHORT_ID")
            .ok_or_else(|| Error::Configuration("COHORT_ID is required".into()))?;
        let cohort_id: u64 = cohort_id
            .trim()
            .parse()
            .map_err(|_| Error::Configuration(format!("COHORT_ID is not an integer: {}", cohort_id)))?;

        let bundler_url = match (get("BUNDLER_URL"), get("BUNDLER_API_KEY")) {
            (Some(url), _) => url,
            (None, Some(key)) => format!(
                "https://api.pimlico.io/v2/{}/rpc?apikey={}",
                ChainId::BASE_SEPOLIA.0,
                key
            ),
            (None, None) => {
                return Err(Error::Configuration(
                    "BUNDLER_URL or BUNDLER_API_KEY is required".into(),
                ));
            }
        };

        let mut config = Self::base_sepolia(cohort_id, bundler_url);

        if let Some(url) = get("RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(url) = get("SIGNING_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(threshold) = get("SIGNING_THRESHOLD") {
            config.threshold = parse_setting("SIGNING_THRESHOLD", &threshold)?;
        }
        if let Some(size) = get("SIGNING_COHORT_SIZE") {
            config.cohort_size = parse_setting("SIGNING_COHORT_SIZE", &size)?;
        }
        if let Some(protocol) = get("SIGNING_PROTOCOL") {
            config.protocol = protocol.parse()?;
        }
        if let Some(account) = get("SMART_ACCOUNT_ADDRESS") {
            config.smart_account = Some(address_setting("SMART_ACCOUNT_ADDRESS", &account)?);
        }
        if let Some(factory) = get("ACCOUNT_FACTORY") {
            config.account_factory = Some(address_setting("ACCOUNT_FACTORY", &factory)?);
        }
        if let Some(owner) = get("ACCOUNT_OWNER") {
            config.account_owner = Some(address_setting("ACCOUNT_OWNER", &owner)?);
        }
        if let Some(hash) = get("ACCOUNT_INIT_CODE_HASH") {
            let parsed = B256::from_str(hash.trim()).map_err(|e| {
                Error::Configuration(format!("ACCOUNT_INIT_CODE_HASH: {}", e))
            })?;
            config.init_code_hash = Some(parsed);
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_setting("REQUEST_TIMEOUT_SECS", &timeout)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(Error::Configuration("threshold must be at least 1".into()));
        }
        // cohort_size only drives legacy discovery; encrypted rounds size from the cohort read
        if self.protocol == ProtocolMode::LegacyPlaintext && self.threshold > self.cohort_size {
            return Err(Error::Configuration(format!(
                "threshold {} exceeds cohort size {}",
                self.threshold, self.cohort_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration("request timeout must be positive".into()));
        }
        for (name, url) in [
            ("rpc_url", &self.rpc_url),
            ("bundler_url", &self.bundler_url),
            ("gateway_url", &self.gateway_url),
            ("gas_price_method", &self.gas_price_method),
        ] {
            if url.trim().is_empty() {
                return Err(Error::Configuration(format!("{} is empty", name)));
            }
        }
        if self.smart_account.is_none() && !self.can_derive_accounts() {
            return Err(Error::Configuration(
                "either SMART_ACCOUNT_ADDRESS or ACCOUNT_FACTORY, ACCOUNT_INIT_CODE_HASH and ACCOUNT_OWNER must be set"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Whether per-user account derivation is configured
    pub fn can_derive_accounts(&self) -> bool {
        self.account_factory.is_some() && self.init_code_hash.is_some() && self.account_owner.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Bundler URL with any API key redacted, for logs
    pub fn redacted_bundler_url(&self) -> String {
        match self.bundler_url.split_once("apikey=") {
            Some((prefix, _)) => format!("{}apikey=<redacted>", prefix),
            None => self.bundler_url.clone(),
        }
    }
}

fn parse_setting<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{} is malformed: {}", name, value)))
}

fn address_setting(name: &str, value: &str) -> Result<Address> {
    parse_address(value.trim()).map_err(|e| Error::Configuration(format!("{}: {}", name, e)))
}
