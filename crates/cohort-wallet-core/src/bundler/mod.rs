//! # Bundler
//!
//! The relay that accepts signed operations and broadcasts them. Besides
//! submission it serves the two gas oracles used to price an operation
//! before it is signed.
//!
//! ## Methods
//!
//! - `<provider>_getUserOperationGasPrice()` - fee tiers (`slow`, `standard`, `fast`)
//! - `eth_estimateUserOperationGas(operation, entryPoint)`
//! - `eth_sendUserOperation(operation, entryPoint)`

pub mod format;
pub mod memory;

use crate::Result;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use format::{BundlerFormatAdapter, RpcUserOperation, placeholder_signature};
pub use memory::MemoryBundler;

/// Fee caps of one price tier, as returned by the bundler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrice {
    #[serde(default)]
    pub max_fee_per_gas: Option<serde_json::Value>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<serde_json::Value>,
}

/// Fee tiers returned by the gas price method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GasPriceTiers {
    #[serde(default)]
    pub slow: Option<GasPrice>,
    #[serde(default)]
    pub standard: Option<GasPrice>,
    #[serde(default)]
    pub fast: Option<GasPrice>,
}

/// Gas estimate for an operation; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(default)]
    pub pre_verification_gas: Option<serde_json::Value>,
    #[serde(default)]
    pub verification_gas_limit: Option<serde_json::Value>,
    #[serde(default)]
    pub call_gas_limit: Option<serde_json::Value>,
}

/// Relay for signed operations
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Current fee tiers
    async fn gas_price(&self) -> Result<GasPriceTiers>;

    /// Estimate gas for an operation carrying a placeholder signature
    async fn estimate_gas(
        &self,
        operation: &RpcUserOperation,
        entry_point: Address,
    ) -> Result<GasEstimate>;

    /// Submit a signed operation, returning the bundler's operation hash.
    ///
    /// An RPC error here means the operation was not broadcast.
    async fn send(&self, operation: &RpcUserOperation, entry_point: Address) -> Result<B256>;
}

// ============================================================================
// HTTP Bundler (requires runtime feature)
// ============================================================================

#[cfg(feature = "runtime")]
pub use http::HttpBundler;

#[cfg(feature = "runtime")]
mod http {
    use super::{Bundler, GasEstimate, GasPriceTiers, RpcUserOperation};
    use crate::chain::RpcClient;
    use crate::{Error, Result};
    use alloy_primitives::{Address, B256};
    use async_trait::async_trait;
    use tracing::{debug, info};

    /// JSON-RPC bundler client
    #[derive(Debug, Clone)]
    pub struct HttpBundler {
        rpc: RpcClient,
        gas_price_method: String,
    }

    impl HttpBundler {
        pub fn new(rpc: RpcClient, gas_price_method: impl Into<String>) -> Self {
            Self {
                rpc,
                gas_price_method: gas_price_method.into(),
            }
        }
    }

    /// JSON-RPC error objects from the bundler are rejections
    fn rejection(e: Error) -> Error {
        match e {
            Error::RpcResponse { code, message } => {
                Error::BundlerRejection(format!("{} (code {})", message, code))
            }
            other => other,
        }
    }

    #[async_trait]
    impl Bundler for HttpBundler {
        async fn gas_price(&self) -> Result<GasPriceTiers> {
            self.rpc
                .request(&self.gas_price_method, serde_json::json!([]))
                .await
                .map_err(rejection)
        }

        async fn estimate_gas(
            &self,
            operation: &RpcUserOperation,
            entry_point: Address,
        ) -> Result<GasEstimate> {
            let estimate: GasEstimate = self
                .rpc
                .request(
                    "eth_estimateUserOperationGas",
                    serde_json::json!([operation, entry_point]),
                )
                .await
                .map_err(rejection)?;
            debug!(?estimate, "Bundler gas estimate");
            Ok(estimate)
        }

        async fn send(&self, operation: &RpcUserOperation, entry_point: Address) -> Result<B256> {
            let hash: B256 = self
                .rpc
                .request(
                    "eth_sendUserOperation",
                    serde_json::json!([operation, entry_point]),
                )
                .await
                .map_err(rejection)?;
            info!(user_op_hash = %hash, sender = %operation.sender, "Operation accepted by bundler");
            Ok(hash)
        }
    }

}
