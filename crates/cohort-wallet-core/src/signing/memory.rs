//! In-memory signing gateway for testing and local development
//!
//! Simulates a cohort of signers. Each holds an X25519 session key and a
//! secp256k1 signing key, and its signer id is the Ethereum address of the
//! signing key. Individual signers can be told to misbehave so that
//! aggregation can be exercised against garbage, silence and wrong hashes.

use super::gateway::{
    CohortMember, LegacySigningBatch, LegacySigningGateway, LegacySigningResults, SigningBatch,
    SigningCohort, SigningGateway, SigningResults,
};
use super::messages::{
    EncryptedSigningRequest, PartialSignatureResponse, SignatureKind, SigningRequest,
};
use super::session::{SessionPublicKey, SharedSecret};
use crate::types::{SIGNATURE_LENGTH, SignerId, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use x25519_dalek::StaticSecret;

/// How a simulated signer answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerBehaviour {
    /// Signs the operation hash and seals a valid response
    Honest,
    /// Signs the EIP-191 digest of the operation hash
    PersonalSign,
    /// Returns bytes that do not decrypt
    GarbageCiphertext,
    /// Never answers
    Silent,
    /// Signs a hash other than the operation's
    WrongHash,
}

#[derive(Clone)]
struct SimulatedSigner {
    id: SignerId,
    session_secret: StaticSecret,
    signing_key: SigningKey,
    behaviour: SignerBehaviour,
}

impl SimulatedSigner {
    fn generate(behaviour: SignerBehaviour) -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self {
            id: SignerId(address_of(signing_key.verifying_key())),
            session_secret: StaticSecret::random_from_rng(OsRng),
            signing_key,
            behaviour,
        }
    }

    fn member(&self) -> CohortMember {
        CohortMember {
            signer_id: self.id,
            session_public_key: SessionPublicKey::from(&self.session_secret),
        }
    }

    /// Produce this signer's response to a decoded request, if any
    fn respond(&self, request: &SigningRequest) -> Result<Option<PartialSignatureResponse>> {
        let operation_hash = request
            .operation
            .hash(request.entry_point, request.chain_id)?;

        let (kind, digest) = match self.behaviour {
            SignerBehaviour::Silent => return Ok(None),
            SignerBehaviour::PersonalSign => (
                SignatureKind::Eip191,
                SignatureKind::Eip191.signed_digest(operation_hash),
            ),
            SignerBehaviour::WrongHash => (
                SignatureKind::UserOperation,
                B256::from(keccak256_hash(operation_hash.as_slice())),
            ),
            SignerBehaviour::Honest | SignerBehaviour::GarbageCiphertext => {
                (SignatureKind::UserOperation, operation_hash)
            }
        };

        Ok(Some(PartialSignatureResponse {
            signer: self.id,
            signature: sign_digest(&self.signing_key, digest)?,
            kind,
            message_hash: digest,
        }))
    }

    fn answer_encrypted(&self, sealed_request: &str) -> Result<Option<String>> {
        let envelope = EncryptedSigningRequest::from_base64(sealed_request)?;
        let secret = SharedSecret::agree(&self.session_secret, &envelope.requester())?;
        let request = SigningRequest::from_bytes(&envelope.open(&secret)?)?;

        let Some(response) = self.respond(&request)? else {
            return Ok(None);
        };
        if self.behaviour == SignerBehaviour::GarbageCiphertext {
            let mut junk = [0u8; 48];
            OsRng.fill_bytes(&mut junk);
            return Ok(Some(STANDARD.encode(junk)));
        }
        Ok(Some(response.seal(&secret)?))
    }

    fn answer_plaintext(&self, request: &str) -> Result<Option<String>> {
        let bytes = STANDARD
            .decode(request)
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        let request = SigningRequest::from_bytes(&bytes)?;

        let Some(response) = self.respond(&request)? else {
            return Ok(None);
        };
        if self.behaviour == SignerBehaviour::GarbageCiphertext {
            return Ok(Some("!!not-base64!!".to_string()));
        }
        Ok(Some(response.to_base64()?))
    }
}

/// In-memory gateway fronting a simulated cohort
#[derive(Clone)]
pub struct MemoryGateway {
    signers: Arc<Vec<SimulatedSigner>>,
    required_context: Arc<Mutex<Vec<String>>>,
    outage: Arc<Mutex<Option<String>>>,
    omit_response_map: Arc<Mutex<bool>>,
    submissions: Arc<AtomicUsize>,
    last_threshold: Arc<Mutex<Option<usize>>>,
}

impl MemoryGateway {
    /// Cohort with one signer per listed behaviour
    pub fn new(behaviours: &[SignerBehaviour]) -> Self {
        Self {
            signers: Arc::new(
                behaviours
                    .iter()
                    .map(|b| SimulatedSigner::generate(*b))
                    .collect(),
            ),
            required_context: Arc::new(Mutex::new(Vec::new())),
            outage: Arc::new(Mutex::new(None)),
            omit_response_map: Arc::new(Mutex::new(false)),
            submissions: Arc::new(AtomicUsize::new(0)),
            last_threshold: Arc::new(Mutex::new(None)),
        }
    }

    /// Cohort of `n` honest signers
    pub fn honest(n: usize) -> Self {
        Self::new(&vec![SignerBehaviour::Honest; n])
    }

    /// Signer ids with their behaviour, in creation order
    pub fn signers(&self) -> Vec<(SignerId, SignerBehaviour)> {
        self.signers.iter().map(|s| (s.id, s.behaviour)).collect()
    }

    /// Ids of signers with the given behaviour
    pub fn signers_with(&self, behaviour: SignerBehaviour) -> Vec<SignerId> {
        self.signers
            .iter()
            .filter(|s| s.behaviour == behaviour)
            .map(|s| s.id)
            .collect()
    }

    /// Members refuse to sign unless the context carries `key`
    pub fn require_context_key(&self, key: impl Into<String>) {
        self.required_context.lock().push(key.into());
    }

    /// Make every call fail as if the gateway were unreachable
    pub fn set_outage(&self, reason: Option<&str>) {
        *self.outage.lock() = reason.map(str::to_string);
    }

    /// Answer submissions without an `encrypted_signature_responses` map
    pub fn omit_response_map(&self, omit: bool) {
        *self.omit_response_map.lock() = omit;
    }

    /// Number of batches submitted so far
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Threshold carried by the most recent batch
    pub fn last_threshold(&self) -> Option<usize> {
        *self.last_threshold.lock()
    }

    fn check_outage(&self) -> Result<()> {
        match self.outage.lock().as_ref() {
            Some(reason) => Err(Error::Gateway(reason.clone())),
            None => Ok(()),
        }
    }

    fn signer(&self, key: &str) -> Option<&SimulatedSigner> {
        let id: SignerId = key.parse().ok()?;
        self.signers.iter().find(|s| s.id == id)
    }

    fn missing_context(&self, request: &SigningRequest) -> Option<String> {
        self.required_context
            .lock()
            .iter()
            .find(|key| request.context.get(key).is_none())
            .cloned()
    }
}

#[async_trait]
impl SigningGateway for MemoryGateway {
    async fn fetch_cohort(&self, _cohort_id: u64, _chain_id: u64) -> Result<SigningCohort> {
        self.check_outage()?;
        Ok(SigningCohort::new(
            self.signers.iter().map(SimulatedSigner::member).collect(),
        ))
    }

    async fn submit(&self, batch: &SigningBatch) -> Result<SigningResults> {
        self.check_outage()?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.last_threshold.lock() = Some(batch.threshold);

        let mut responses = BTreeMap::new();
        let mut errors = serde_json::Map::new();

        for (key, sealed) in &batch.encrypted_signing_requests {
            let Some(signer) = self.signer(key) else {
                errors.insert(key.clone(), "unknown signer".into());
                continue;
            };

            // Members check conditions against the decrypted context
            if !self.required_context.lock().is_empty() {
                let envelope = EncryptedSigningRequest::from_base64(sealed)?;
                let secret = SharedSecret::agree(&signer.session_secret, &envelope.requester())?;
                let request = SigningRequest::from_bytes(&envelope.open(&secret)?)?;
                if let Some(missing) = self.missing_context(&request) {
                    errors.insert(key.clone(), format!("missing context variable {}", missing).into());
                    continue;
                }
            }

            match signer.answer_encrypted(sealed) {
                Ok(Some(response)) => {
                    responses.insert(key.clone(), response);
                }
                Ok(None) => {}
                Err(e) => {
                    errors.insert(key.clone(), e.to_string().into());
                }
            }
        }

        let omit = *self.omit_response_map.lock();
        Ok(SigningResults {
            encrypted_signature_responses: if omit { None } else { Some(responses) },
            errors: (!errors.is_empty()).then_some(serde_json::Value::Object(errors)),
        })
    }
}

#[async_trait]
impl LegacySigningGateway for MemoryGateway {
    async fn fetch_signers(&self, quantity: usize) -> Result<Vec<SignerId>> {
        self.check_outage()?;
        Ok(self.signers.iter().take(quantity).map(|s| s.id).collect())
    }

    async fn submit_plaintext(&self, batch: &LegacySigningBatch) -> Result<LegacySigningResults> {
        self.check_outage()?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.last_threshold.lock() = Some(batch.threshold);

        let mut signatures = BTreeMap::new();
        for (key, request) in &batch.signing_requests {
            let Some(signer) = self.signer(key) else {
                continue;
            };
            if let Some(response) = signer.answer_plaintext(request)? {
                signatures.insert(key.clone(), vec![key.clone(), response]);
            }
        }

        let omit = *self.omit_response_map.lock();
        Ok(LegacySigningResults {
            signatures: if omit { None } else { Some(signatures) },
            errors: None,
        })
    }
}

impl std::fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("signers", &self.signers())
            .field("submissions", &self.submission_count())
            .finish()
    }
}

/// Ethereum address of a secp256k1 public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 prefix
    let hash = keccak256_hash(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recoverable signature `r || s || v` with `v` in {27, 28}
pub fn sign_digest(key: &SigningKey, digest: B256) -> Result<Vec<u8>> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| Error::Crypto(format!("signing failed: {}", e)))?;

    let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
    bytes.extend_from_slice(&signature.to_bytes());
    bytes.push(recovery_id.to_byte() + 27);
    Ok(bytes)
}

/// Signer id that produced a 65-byte recoverable signature over `digest`
pub fn recover_signer(digest: B256, signature: &[u8]) -> Result<SignerId> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(Error::Crypto(format!(
            "expected {} signature bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| Error::Crypto(format!("invalid signature: {}", e)))?;
    let recovery_id = RecoveryId::from_byte(signature[64].wrapping_sub(27))
        .ok_or_else(|| Error::Crypto("invalid recovery id".into()))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|e| Error::Crypto(format!("recovery failed: {}", e)))?;
    Ok(SignerId(address_of(&key)))
}
