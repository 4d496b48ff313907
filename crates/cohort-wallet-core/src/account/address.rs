//! Counterfactual smart-account addresses
//!
//! Every user maps to one account address through CREATE2, whether or not
//! the account has been deployed yet.

use crate::types::keccak256_hash;
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Derives account addresses from stable user identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResolver {
    factory: Address,
    init_code_hash: B256,
}

impl AddressResolver {
    pub fn new(factory: Address, init_code_hash: B256) -> Self {
        Self {
            factory,
            init_code_hash,
        }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// 32-byte CREATE2 salt for a user identifier
    pub fn salt_for(&self, user_id: &str) -> Result<B256> {
        Ok(B256::from(parse_identifier(user_id)?.to_be_bytes::<32>()))
    }

    /// Account address for a user identifier
    pub fn resolve(&self, user_id: &str) -> Result<Address> {
        let salt = self.salt_for(user_id)?;
        Ok(self.address_for_salt(&salt))
    }

    /// Account address for a user identifier, EIP-55 checksummed
    pub fn resolve_checksummed(&self, user_id: &str) -> Result<String> {
        Ok(self.resolve(user_id)?.to_checksum(None))
    }

    /// CREATE2: keccak256(0xff || factory || salt || initCodeHash)[12..]
    pub fn address_for_salt(&self, salt: &B256) -> Address {
        let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
        preimage.push(0xff);
        preimage.extend_from_slice(self.factory.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        preimage.extend_from_slice(self.init_code_hash.as_slice());

        let hash = keccak256_hash(&preimage);

        // Take last 20 bytes
        Address::from_slice(&hash[12..])
    }
}

/// Parse a user identifier as a non-negative decimal integer
pub fn parse_identifier(user_id: &str) -> Result<U256> {
    if user_id.is_empty() || !user_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidIdentifier(user_id.to_string()));
    }
    U256::from_str_radix(user_id, 10)
        .map_err(|e| Error::InvalidIdentifier(format!("{}: {}", user_id, e)))
}
