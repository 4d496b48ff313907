//! Core types shared across the signing pipeline
//!
//! Signer identities, the explicit authorization context that travels with
//! every signing round, and the address/amount parsing helpers used at the
//! caller boundary.

use crate::{Error, Result};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Length of one partial ECDSA signature (r || s || v)
pub const SIGNATURE_LENGTH: usize = 65;

/// Decimals of the native currency on EVM chains
pub const NATIVE_DECIMALS: u8 = 18;

/// Identity of a cohort member.
///
/// Ordering is the numeric order of the 160-bit address, which is what the
/// verifying contract uses to decode a combined signature positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerId(pub Address);

impl SignerId {
    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Checksummed string form, used as the key in gateway maps
    pub fn to_checksum(&self) -> String {
        self.0.to_checksum(None)
    }
}

impl FromStr for SignerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_address(s).map(SignerId)
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl From<Address> for SignerId {
    fn from(address: Address) -> Self {
        SignerId(address)
    }
}

/// Application-supplied authorization context for one signing round.
///
/// Cohort members evaluate their signing conditions against these values.
/// The context is passed explicitly through every stage of a round and is
/// never stored outside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningContext {
    entries: BTreeMap<String, String>,
}

impl SigningContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a context variable
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a context variable, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up a context variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a `0x`-prefixed 20-byte hex address
pub fn parse_address(address: &str) -> Result<Address> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| Error::InvalidAddress(format!("missing 0x prefix: {}", address)))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidAddress(address.to_string()));
    }

    Address::from_str(address).map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
}

/// Parse a decimal amount in native units ("0.01") into base units
pub fn parse_native_amount(value: &str, decimals: u8) -> Result<U256> {
    let invalid = || Error::InvalidAmount(value.to_string());

    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "too many decimal places: {}",
            value
        )));
    }

    // Pad the fraction with zeros to the full precision
    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    for _ in fraction.len()..decimals as usize {
        digits.push('0');
    }

    let amount = U256::from_str_radix(&digits, 10).map_err(|_| invalid())?;
    if amount.is_zero() {
        return Err(Error::InvalidAmount(format!("must be greater than 0: {}", value)));
    }
    Ok(amount)
}

/// Format base units as a human-readable native amount
pub fn format_native_amount(raw: U256, decimals: u8) -> String {
    if raw.is_zero() {
        return "0".to_string();
    }

    let divisor = (0..decimals).fold(U256::from(1u8), |acc, _| acc * U256::from(10u8));
    let whole = raw / divisor;
    let fraction = raw % divisor;

    if fraction.is_zero() {
        whole.to_string()
    } else {
        let fraction_str = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
        let trimmed = fraction_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Compute Keccak256 hash of data
pub fn keccak256_hash(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// First four bytes of the Keccak256 hash of a function signature
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256_hash(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}
