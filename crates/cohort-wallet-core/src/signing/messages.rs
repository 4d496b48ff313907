//! Signing protocol messages
//!
//! A round sends one [`SigningRequest`] to every cohort member, sealed under
//! that member's shared secret, and gets back one sealed
//! [`PartialSignatureResponse`] per cooperating member. Everything crosses
//! the gateway as standard base64.

use super::session::{NONCE_LENGTH, PUBLIC_KEY_LENGTH, SessionPublicKey, SharedSecret, TAG_LENGTH};
use crate::account::UserOperation;
use crate::account::operation::bytes_hex;
use crate::config::AaVersion;
use crate::types::{SigningContext, SignerId, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Version tag carried in every signing request
pub const PROTOCOL_VERSION: &str = "1.0";

/// What a cohort member is asked to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub operation: UserOperation,
    pub entry_point: Address,
    pub chain_id: u64,
    pub cohort_id: u64,
    pub threshold: usize,
    pub aa_version: AaVersion,
    pub protocol_version: String,
    /// Authorization context the member evaluates its conditions against
    pub context: SigningContext,
}

impl SigningRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Plain base64 form used by the legacy protocol
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }
}

/// A signing request sealed for one member:
/// `requester_public_key(32) || nonce(12) || ciphertext+tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSigningRequest {
    requester: SessionPublicKey,
    sealed: Vec<u8>,
}

impl EncryptedSigningRequest {
    const MIN_LENGTH: usize = PUBLIC_KEY_LENGTH + NONCE_LENGTH + TAG_LENGTH;

    /// Encrypt a serialized request under `secret`
    pub fn seal(plaintext: &[u8], requester: SessionPublicKey, secret: &SharedSecret) -> Result<Self> {
        Ok(Self {
            requester,
            sealed: secret.encrypt(plaintext)?,
        })
    }

    /// Decrypt with the secret the member derived from [`Self::requester`]
    pub fn open(&self, secret: &SharedSecret) -> Result<Vec<u8>> {
        secret.decrypt(&self.sealed)
    }

    /// Ephemeral public key the member agrees with
    pub fn requester(&self) -> SessionPublicKey {
        self.requester
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + self.sealed.len());
        bytes.extend_from_slice(self.requester.as_bytes());
        bytes.extend_from_slice(&self.sealed);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::MIN_LENGTH {
            return Err(Error::Deserialization(format!(
                "encrypted request too short: {} bytes",
                bytes.len()
            )));
        }
        let (key, sealed) = bytes.split_at(PUBLIC_KEY_LENGTH);
        Ok(Self {
            requester: SessionPublicKey::from_slice(key)?,
            sealed: sealed.to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Deserialization(format!("invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// How the member produced its signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureKind {
    /// Raw ECDSA over the EntryPoint operation hash
    #[serde(rename = "userop")]
    UserOperation,
    /// ECDSA over the EIP-191 personal-message digest of the operation hash
    #[serde(rename = "eip191")]
    Eip191,
}

impl SignatureKind {
    /// Digest a member of this kind signs for `operation_hash`
    pub fn signed_digest(&self, operation_hash: B256) -> B256 {
        match self {
            SignatureKind::UserOperation => operation_hash,
            SignatureKind::Eip191 => {
                let mut message = b"\x19Ethereum Signed Message:\n32".to_vec();
                message.extend_from_slice(operation_hash.as_slice());
                B256::from(keccak256_hash(&message))
            }
        }
    }
}

/// One member's contribution to the combined signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignatureResponse {
    pub signer: SignerId,
    /// 65-byte `r || s || v`
    #[serde(with = "bytes_hex")]
    pub signature: Vec<u8>,
    pub kind: SignatureKind,
    /// Digest the member actually signed
    pub message_hash: B256,
}

impl PartialSignatureResponse {
    /// Seal under the member's shared secret and base64-encode
    pub fn seal(&self, secret: &SharedSecret) -> Result<String> {
        let plaintext = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(secret.encrypt(&plaintext)?))
    }

    /// Decode and decrypt a sealed response
    pub fn open(encoded: &str, secret: &SharedSecret) -> Result<Self> {
        let sealed = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Deserialization(format!("invalid base64: {}", e)))?;
        let plaintext = secret.decrypt(&sealed)?;
        Self::from_bytes(&plaintext)
    }

    /// Plain base64 form used by the legacy protocol
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Deserialization(format!("invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
