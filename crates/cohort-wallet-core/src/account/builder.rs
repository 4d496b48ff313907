//! Builds unsigned operations for smart-account actions

use super::operation::{GasLimits, UserOperation};
use crate::Result;
use crate::types::{function_selector, parse_address};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Factory call used to deploy an account the first time it acts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeployment {
    /// Account factory contract
    pub factory: Address,
    /// Owner passed to `createAccount`
    pub owner: Address,
}

/// Builder for a single [`UserOperation`].
///
/// Pure: it never performs network I/O. The caller supplies the nonce and
/// deployment state read from the chain.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    sender: Address,
    nonce: U256,
    deployed: bool,
    deployment: Option<(AccountDeployment, U256)>,
    gas: GasLimits,
}

impl OperationBuilder {
    /// Start an operation for `sender` at anti-replay counter `nonce`
    pub fn new(sender: Address, nonce: U256) -> Self {
        Self {
            sender,
            nonce,
            deployed: true,
            deployment: None,
            gas: GasLimits::default(),
        }
    }

    /// Whether the sender already has code on chain
    pub fn account_deployed(mut self, deployed: bool) -> Self {
        self.deployed = deployed;
        self
    }

    /// Deployment payload used when the account is not yet deployed
    pub fn deploy_with(mut self, deployment: AccountDeployment, salt: U256) -> Self {
        self.deployment = Some((deployment, salt));
        self
    }

    /// Override the initial gas limits
    pub fn gas_limits(mut self, gas: GasLimits) -> Self {
        self.gas = gas;
        self
    }

    /// Native value transfer to `to`
    pub fn transfer(self, to: &str, value: U256) -> Result<UserOperation> {
        let to = parse_address(to)?;
        Ok(self.call(to, value, &[]))
    }

    /// Arbitrary call from the account
    pub fn call(self, to: Address, value: U256, data: &[u8]) -> UserOperation {
        let call_data = encode_execute(to, value, data);
        let operation = UserOperation::new(self.sender, self.nonce, call_data, self.gas);

        match (self.deployed, self.deployment) {
            (false, Some((deployment, salt))) => {
                debug!(
                    sender = %self.sender,
                    factory = %deployment.factory,
                    "Account not deployed, attaching factory call"
                );
                let factory_data = encode_create_account(deployment.owner, salt);
                operation.with_factory(deployment.factory, factory_data)
            }
            _ => operation,
        }
    }
}

/// Calldata for `execute((address target, uint256 value, bytes data))`
pub fn encode_execute(to: Address, value: U256, data: &[u8]) -> Vec<u8> {
    let mut encoded = function_selector("execute((address,uint256,bytes))").to_vec();

    // offset to the tuple (it holds a dynamic member)
    encoded.extend_from_slice(&U256::from(32u64).to_be_bytes::<32>());

    // address (32 bytes padded)
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(to.as_slice());

    // uint256 value
    encoded.extend_from_slice(&value.to_be_bytes::<32>());

    // bytes offset within the tuple (3 * 32 bytes)
    encoded.extend_from_slice(&U256::from(96u64).to_be_bytes::<32>());

    // length
    encoded.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());

    // data (padded to 32 bytes)
    encoded.extend_from_slice(data);
    let padding = (32 - (data.len() % 32)) % 32;
    encoded.extend_from_slice(&vec![0u8; padding]);

    encoded
}

/// Calldata for `createAccount(address owner, uint256 salt)`
pub fn encode_create_account(owner: Address, salt: U256) -> Vec<u8> {
    let mut encoded = function_selector("createAccount(address,uint256)").to_vec();
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(owner.as_slice());
    encoded.extend_from_slice(&salt.to_be_bytes::<32>());
    encoded
}
