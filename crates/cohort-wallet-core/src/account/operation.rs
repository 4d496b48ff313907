//! ERC-4337 UserOperation (EntryPoint v0.7) and its signed form

use crate::types::{SIGNATURE_LENGTH, SignerId, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Unsigned ERC-4337 UserOperation in the unpacked v0.7 layout.
///
/// The sender, nonce, calldata and deployment/paymaster fields are fixed at
/// construction. Only the gas and fee fields can change afterwards, through
/// the re-pricing setters used before signing. There is no signature field:
/// a signature only ever exists on a [`SignedOperation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    sender: Address,
    nonce: U256,
    factory: Option<Address>,
    #[serde(with = "bytes_hex")]
    factory_data: Vec<u8>,
    #[serde(with = "bytes_hex")]
    call_data: Vec<u8>,
    call_gas_limit: U256,
    verification_gas_limit: U256,
    pre_verification_gas: U256,
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
    paymaster: Option<Address>,
    paymaster_verification_gas_limit: U256,
    paymaster_post_op_gas_limit: U256,
    #[serde(with = "bytes_hex")]
    paymaster_data: Vec<u8>,
}

/// Gas and fee values applied to a new operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasLimits {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            call_gas_limit: U256::from(300_000u64),
            verification_gas_limit: U256::from(1_000_000u64),
            pre_verification_gas: U256::from(60_000u64),
            max_fee_per_gas: U256::from(1_100_000u64),
            max_priority_fee_per_gas: U256::from(1_100_000u64),
        }
    }
}

/// Paymaster sponsoring an operation's gas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paymaster {
    pub address: Address,
    pub verification_gas_limit: U256,
    pub post_op_gas_limit: U256,
    pub data: Vec<u8>,
}

pub(crate) mod bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

impl UserOperation {
    /// Create an operation with no deployment payload and no paymaster
    pub fn new(sender: Address, nonce: U256, call_data: Vec<u8>, gas: GasLimits) -> Self {
        Self {
            sender,
            nonce,
            factory: None,
            factory_data: Vec::new(),
            call_data,
            call_gas_limit: gas.call_gas_limit,
            verification_gas_limit: gas.verification_gas_limit,
            pre_verification_gas: gas.pre_verification_gas,
            max_fee_per_gas: gas.max_fee_per_gas,
            max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
            paymaster: None,
            paymaster_verification_gas_limit: U256::ZERO,
            paymaster_post_op_gas_limit: U256::ZERO,
            paymaster_data: Vec::new(),
        }
    }

    /// Attach the factory call that deploys the sender on first use
    pub fn with_factory(mut self, factory: Address, factory_data: Vec<u8>) -> Self {
        self.factory = Some(factory);
        self.factory_data = factory_data;
        self
    }

    /// Attach a paymaster
    pub fn with_paymaster(mut self, paymaster: Paymaster) -> Self {
        self.paymaster = Some(paymaster.address);
        self.paymaster_verification_gas_limit = paymaster.verification_gas_limit;
        self.paymaster_post_op_gas_limit = paymaster.post_op_gas_limit;
        self.paymaster_data = paymaster.data;
        self
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn factory(&self) -> Option<Address> {
        self.factory
    }

    pub fn factory_data(&self) -> &[u8] {
        &self.factory_data
    }

    pub fn call_data(&self) -> &[u8] {
        &self.call_data
    }

    pub fn call_gas_limit(&self) -> U256 {
        self.call_gas_limit
    }

    pub fn verification_gas_limit(&self) -> U256 {
        self.verification_gas_limit
    }

    pub fn pre_verification_gas(&self) -> U256 {
        self.pre_verification_gas
    }

    pub fn max_fee_per_gas(&self) -> U256 {
        self.max_fee_per_gas
    }

    pub fn max_priority_fee_per_gas(&self) -> U256 {
        self.max_priority_fee_per_gas
    }

    pub fn paymaster(&self) -> Option<Address> {
        self.paymaster
    }

    pub fn paymaster_verification_gas_limit(&self) -> U256 {
        self.paymaster_verification_gas_limit
    }

    pub fn paymaster_post_op_gas_limit(&self) -> U256 {
        self.paymaster_post_op_gas_limit
    }

    pub fn paymaster_data(&self) -> &[u8] {
        &self.paymaster_data
    }

    // ------------------------------------------------------------------
    // Re-pricing (the only mutation allowed after construction)
    // ------------------------------------------------------------------

    pub fn set_fees(&mut self, max_fee_per_gas: U256, max_priority_fee_per_gas: U256) {
        self.max_fee_per_gas = max_fee_per_gas;
        self.max_priority_fee_per_gas = max_priority_fee_per_gas;
    }

    pub fn set_max_fee_per_gas(&mut self, value: U256) {
        self.max_fee_per_gas = value;
    }

    pub fn set_max_priority_fee_per_gas(&mut self, value: U256) {
        self.max_priority_fee_per_gas = value;
    }

    pub fn set_call_gas_limit(&mut self, value: U256) {
        self.call_gas_limit = value;
    }

    pub fn set_verification_gas_limit(&mut self, value: U256) {
        self.verification_gas_limit = value;
    }

    pub fn set_pre_verification_gas(&mut self, value: U256) {
        self.pre_verification_gas = value;
    }

    /// `factory || factoryData`, empty when the account already exists
    pub fn init_code(&self) -> Vec<u8> {
        match self.factory {
            Some(factory) => {
                let mut init_code = factory.to_vec();
                init_code.extend_from_slice(&self.factory_data);
                init_code
            }
            None => Vec::new(),
        }
    }

    /// `paymaster || verificationGasLimit(16) || postOpGasLimit(16) || data`
    pub fn paymaster_and_data(&self) -> Result<Vec<u8>> {
        match self.paymaster {
            Some(paymaster) => {
                let mut packed = paymaster.to_vec();
                packed.extend_from_slice(&gas_u128(
                    "paymasterVerificationGasLimit",
                    self.paymaster_verification_gas_limit,
                )?
                .to_be_bytes());
                packed.extend_from_slice(&gas_u128(
                    "paymasterPostOpGasLimit",
                    self.paymaster_post_op_gas_limit,
                )?
                .to_be_bytes());
                packed.extend_from_slice(&self.paymaster_data);
                Ok(packed)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Check the operation can be expressed on the wire
    pub fn validate_encoding(&self) -> Result<()> {
        if self.factory.is_none() && !self.factory_data.is_empty() {
            return Err(Error::Encoding("factoryData present without factory".into()));
        }
        if self.paymaster.is_none()
            && (!self.paymaster_verification_gas_limit.is_zero()
                || !self.paymaster_post_op_gas_limit.is_zero()
                || !self.paymaster_data.is_empty())
        {
            return Err(Error::Encoding(
                "paymaster fields present without paymaster".into(),
            ));
        }
        for (name, value) in [
            ("callGasLimit", self.call_gas_limit),
            ("verificationGasLimit", self.verification_gas_limit),
            ("maxFeePerGas", self.max_fee_per_gas),
            ("maxPriorityFeePerGas", self.max_priority_fee_per_gas),
            ("paymasterVerificationGasLimit", self.paymaster_verification_gas_limit),
            ("paymasterPostOpGasLimit", self.paymaster_post_op_gas_limit),
        ] {
            gas_u128(name, value)?;
        }
        Ok(())
    }

    /// EntryPoint v0.7 operation hash, the digest cohort members sign
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> Result<B256> {
        self.validate_encoding()?;

        let packed = self.pack_for_hash()?;
        let inner_hash = keccak256_hash(&packed);

        // abi.encode(innerHash, entryPoint, chainId)
        let mut outer = Vec::with_capacity(96);
        outer.extend_from_slice(&inner_hash);
        outer.extend_from_slice(&[0u8; 12]);
        outer.extend_from_slice(entry_point.as_slice());
        outer.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());

        Ok(B256::from(keccak256_hash(&outer)))
    }

    /// abi.encode of the PackedUserOperation with dynamic fields hashed
    fn pack_for_hash(&self) -> Result<Vec<u8>> {
        let mut packed = Vec::with_capacity(8 * 32);

        // sender (address - 32 bytes padded)
        packed.extend_from_slice(&[0u8; 12]);
        packed.extend_from_slice(self.sender.as_slice());

        packed.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        packed.extend_from_slice(&keccak256_hash(&self.init_code()));
        packed.extend_from_slice(&keccak256_hash(&self.call_data));

        // accountGasLimits = verificationGasLimit(16) || callGasLimit(16)
        packed.extend_from_slice(&pack_halves(
            gas_u128("verificationGasLimit", self.verification_gas_limit)?,
            gas_u128("callGasLimit", self.call_gas_limit)?,
        ));

        packed.extend_from_slice(&self.pre_verification_gas.to_be_bytes::<32>());

        // gasFees = maxPriorityFeePerGas(16) || maxFeePerGas(16)
        packed.extend_from_slice(&pack_halves(
            gas_u128("maxPriorityFeePerGas", self.max_priority_fee_per_gas)?,
            gas_u128("maxFeePerGas", self.max_fee_per_gas)?,
        ));

        packed.extend_from_slice(&keccak256_hash(&self.paymaster_and_data()?));

        Ok(packed)
    }
}

/// Narrow a gas value to the 128 bits the packed layout allows
pub(crate) fn gas_u128(name: &str, value: U256) -> Result<u128> {
    u128::try_from(value)
        .map_err(|_| Error::Encoding(format!("{} exceeds 128 bits: {}", name, value)))
}

fn pack_halves(high: u128, low: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&high.to_be_bytes());
    word[16..].copy_from_slice(&low.to_be_bytes());
    word
}

// ============================================================================
// Signed Operation
// ============================================================================

/// Positional concatenation of `threshold` partial signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedSignature {
    bytes: Vec<u8>,
    signers: Vec<SignerId>,
}

impl CombinedSignature {
    /// Build from partial signatures already in contract order
    pub(crate) fn from_ordered(parts: Vec<(SignerId, Vec<u8>)>) -> Result<Self> {
        let mut bytes = Vec::with_capacity(parts.len() * SIGNATURE_LENGTH);
        let mut signers = Vec::with_capacity(parts.len());
        for (signer, signature) in parts {
            if signature.len() != SIGNATURE_LENGTH {
                return Err(Error::Crypto(format!(
                    "partial signature from {} is {} bytes",
                    signer,
                    signature.len()
                )));
            }
            bytes.extend_from_slice(&signature);
            signers.push(signer);
        }
        Ok(Self { bytes, signers })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Contributing signers, in the order their signatures appear
    pub fn signers(&self) -> &[SignerId] {
        &self.signers
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }
}

/// A UserOperation bound to its final combined signature.
///
/// Only the aggregation step can create one, and it exposes no mutators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    operation: UserOperation,
    signature: CombinedSignature,
    hash: B256,
}

impl SignedOperation {
    pub(crate) fn new(operation: UserOperation, signature: CombinedSignature, hash: B256) -> Self {
        Self {
            operation,
            signature,
            hash,
        }
    }

    pub fn operation(&self) -> &UserOperation {
        &self.operation
    }

    pub fn signature(&self) -> &CombinedSignature {
        &self.signature
    }

    /// Operation hash the cohort signed
    pub fn hash(&self) -> B256 {
        self.hash
    }
}
