//! Bundler wire format for EntryPoint v0.7 operations
//!
//! Integers become lowercase `0x` hex quantities, byte strings become `0x`
//! hex, and absent factory or paymaster fields are sent as explicit JSON
//! `null` rather than omitted.

use crate::account::operation::gas_u128;
use crate::account::{SignedOperation, UserOperation};
use crate::types::SIGNATURE_LENGTH;
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A UserOperation as bundlers expect it in JSON-RPC params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUserOperation {
    pub sender: String,
    pub nonce: String,
    pub factory: Option<String>,
    pub factory_data: Option<String>,
    pub call_data: String,
    pub call_gas_limit: String,
    pub verification_gas_limit: String,
    pub pre_verification_gas: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub paymaster: Option<String>,
    pub paymaster_verification_gas_limit: Option<String>,
    pub paymaster_post_op_gas_limit: Option<String>,
    pub paymaster_data: Option<String>,
    pub signature: String,
}

/// Pure conversion from internal operations to [`RpcUserOperation`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BundlerFormatAdapter;

impl BundlerFormatAdapter {
    /// Encode an operation carrying `signature`
    pub fn to_rpc(operation: &UserOperation, signature: &[u8]) -> Result<RpcUserOperation> {
        operation.validate_encoding()?;

        let (factory, factory_data) = match operation.factory() {
            Some(factory) => (
                Some(address_hex(factory)),
                Some(bytes_hex(operation.factory_data())),
            ),
            None => (None, None),
        };

        let (paymaster, pm_verification, pm_post_op, pm_data) = match operation.paymaster() {
            Some(paymaster) => (
                Some(address_hex(paymaster)),
                Some(quantity(U256::from(gas_u128(
                    "paymasterVerificationGasLimit",
                    operation.paymaster_verification_gas_limit(),
                )?))),
                Some(quantity(U256::from(gas_u128(
                    "paymasterPostOpGasLimit",
                    operation.paymaster_post_op_gas_limit(),
                )?))),
                Some(bytes_hex(operation.paymaster_data())),
            ),
            None => (None, None, None, None),
        };

        Ok(RpcUserOperation {
            sender: address_hex(operation.sender()),
            nonce: quantity(operation.nonce()),
            factory,
            factory_data,
            call_data: bytes_hex(operation.call_data()),
            call_gas_limit: quantity(operation.call_gas_limit()),
            verification_gas_limit: quantity(operation.verification_gas_limit()),
            pre_verification_gas: quantity(operation.pre_verification_gas()),
            max_fee_per_gas: quantity(operation.max_fee_per_gas()),
            max_priority_fee_per_gas: quantity(operation.max_priority_fee_per_gas()),
            paymaster,
            paymaster_verification_gas_limit: pm_verification,
            paymaster_post_op_gas_limit: pm_post_op,
            paymaster_data: pm_data,
            signature: bytes_hex(signature),
        })
    }

    /// Encode a signed operation for `eth_sendUserOperation`
    pub fn to_rpc_signed(signed: &SignedOperation) -> Result<RpcUserOperation> {
        Self::to_rpc(signed.operation(), signed.signature().as_bytes())
    }

    /// Encode an unsigned operation with an all-zero signature of the final
    /// combined length, for gas estimation
    pub fn to_rpc_placeholder(operation: &UserOperation, threshold: usize) -> Result<RpcUserOperation> {
        if threshold == 0 {
            return Err(Error::Encoding("placeholder signature for zero signers".into()));
        }
        Self::to_rpc(operation, &placeholder_signature(threshold))
    }
}

/// All-zero combined signature for `threshold` signers
pub fn placeholder_signature(threshold: usize) -> Vec<u8> {
    vec![0u8; threshold * SIGNATURE_LENGTH]
}

fn quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

fn bytes_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn address_hex(address: Address) -> String {
    address.to_checksum(None)
}
