//! JSON-RPC backed [`ChainReader`]

use super::{Balance, ChainReader, RpcClient, parse_hex_u256};
use crate::types::function_selector;
use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tracing::debug;

/// Reads balances, code and EntryPoint nonces from an EVM node
#[derive(Debug, Clone)]
pub struct EvmReader {
    rpc: RpcClient,
    entry_point: Address,
}

impl EvmReader {
    pub fn new(rpc: RpcClient, entry_point: Address) -> Self {
        Self { rpc, entry_point }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    async fn balance(&self, address: Address) -> Result<Balance> {
        let result: String = self
            .rpc
            .request("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;

        Ok(Balance::native(parse_hex_u256(&result)?))
    }

    async fn account_nonce(&self, sender: Address) -> Result<U256> {
        let call_data = encode_get_nonce(sender, U256::ZERO);

        let result: String = self
            .rpc
            .request(
                "eth_call",
                serde_json::json!([{
                    "to": self.entry_point,
                    "data": format!("0x{}", hex::encode(&call_data)),
                }, "latest"]),
            )
            .await?;

        let nonce = decode_word(&result)?;
        debug!(sender = %sender, nonce = %nonce, "Read EntryPoint nonce");
        Ok(nonce)
    }

    async fn is_deployed(&self, address: Address) -> Result<bool> {
        let result: String = self
            .rpc
            .request("eth_getCode", serde_json::json!([address, "latest"]))
            .await?;

        // "0x" or "0x0" means no code
        Ok(result != "0x" && result != "0x0")
    }
}

/// Calldata for `getNonce(address sender, uint192 key)`
pub fn encode_get_nonce(sender: Address, key: U256) -> Vec<u8> {
    let mut encoded = function_selector("getNonce(address,uint192)").to_vec();

    // address (32 bytes padded)
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(sender.as_slice());

    // uint192 key (32 bytes)
    encoded.extend_from_slice(&key.to_be_bytes::<32>());

    encoded
}

/// Decode the first 32-byte word of an `eth_call` return value
fn decode_word(result: &str) -> Result<U256> {
    let bytes = hex::decode(result.strip_prefix("0x").unwrap_or(result))?;
    if bytes.len() < 32 {
        return Err(Error::Deserialization(format!(
            "expected a 32-byte word, got {} bytes",
            bytes.len()
        )));
    }
    Ok(U256::from_be_slice(&bytes[..32]))
}
