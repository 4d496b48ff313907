//! # Chain Reads
//!
//! Read-only access to the chain a smart account lives on. A signing round
//! needs three facts before it builds an operation: the account's native
//! balance, its EntryPoint anti-replay counter and whether its code is
//! already deployed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cohort_wallet_core::chain::{ChainReader, EvmReader, RpcClient};
//!
//! let rpc = RpcClient::new("https://sepolia.base.org", Duration::from_secs(30))?;
//! let reader = EvmReader::new(rpc, ENTRY_POINT_V07);
//!
//! let nonce = reader.account_nonce(sender).await?;
//! ```

#[cfg(feature = "runtime")]
pub mod evm;
pub mod memory;

use crate::types::{NATIVE_DECIMALS, format_native_amount};
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "runtime")]
pub use evm::EvmReader;
pub use memory::MemoryChain;

// ============================================================================
// Core Types
// ============================================================================

/// EVM chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const ETHEREUM_MAINNET: ChainId = ChainId(1);
    pub const ETHEREUM_SEPOLIA: ChainId = ChainId(11155111);
    pub const BASE: ChainId = ChainId(8453);
    pub const BASE_SEPOLIA: ChainId = ChainId(84532);

    /// Get the name for this chain
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "Ethereum Mainnet",
            11155111 => "Ethereum Sepolia",
            8453 => "Base",
            84532 => "Base Sepolia",
            _ => "Unknown Chain",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Native balance of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Raw balance in wei
    pub raw: U256,
    /// Human-readable balance with decimals
    pub formatted: String,
    /// Number of decimals
    pub decimals: u8,
}

impl Balance {
    /// Create a native (18 decimal) balance
    pub fn native(raw: U256) -> Self {
        Self::new(raw, NATIVE_DECIMALS)
    }

    pub fn new(raw: U256, decimals: u8) -> Self {
        Self {
            raw,
            formatted: format_native_amount(raw, decimals),
            decimals,
        }
    }

    /// Check if balance is zero
    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Whether the balance covers `amount`
    pub fn covers(&self, amount: U256) -> bool {
        self.raw >= amount
    }
}

// ============================================================================
// Chain Reader Trait
// ============================================================================

/// Read-only chain access needed to prepare an operation
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Native balance of `address`
    async fn balance(&self, address: Address) -> Result<Balance>;

    /// EntryPoint anti-replay counter for `sender` (key 0)
    async fn account_nonce(&self, sender: Address) -> Result<U256>;

    /// Whether contract code exists at `address`
    async fn is_deployed(&self, address: Address) -> Result<bool>;
}

/// Parse a `0x`-prefixed hex quantity as returned by JSON-RPC nodes
pub fn parse_hex_u256(value: &str) -> Result<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| Error::Deserialization(format!("bad hex quantity {}: {}", value, e)))
}

// ============================================================================
// RPC Client (requires runtime feature)
// ============================================================================

/// Single-endpoint JSON-RPC client with a fixed request timeout.
///
/// There is no failover and no retry: a failed call aborts the round.
#[cfg(feature = "runtime")]
#[derive(Clone)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
}

#[cfg(feature = "runtime")]
impl RpcClient {
    /// Create a new RPC client
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Configuration("RPC URL required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    /// Make a JSON-RPC request and decode its `result`
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::Rpc(format!("{} request failed: {}", method, e)))?;

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Rpc(format!("Failed to parse {} response: {}", method, e)))?;

        if let Some(error) = response_body.get("error") {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(Error::RpcResponse { code, message });
        }

        let result = response_body
            .get("result")
            .ok_or_else(|| Error::Rpc(format!("Missing result in {} response", method)))?;

        serde_json::from_value(result.clone())
            .map_err(|e| Error::Deserialization(format!("{} result: {}", method, e)))
    }
}

#[cfg(feature = "runtime")]
impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bundler URLs carry API keys in the query string
        let shown = self.url.split('?').next().unwrap_or_default();
        f.debug_struct("RpcClient").field("url", &shown).finish()
    }
}
