//! Ephemeral session keys and per-signer shared secrets
//!
//! Each signing round generates one X25519 key pair. Agreeing it with a
//! cohort member's published session key and running HKDF-SHA256 over the
//! result gives the symmetric key for that member's request and response.
//! Payloads are sealed with ChaCha20-Poly1305 and framed as
//! `nonce(12) || ciphertext+tag`.

use super::gateway::SigningCohort;
use crate::types::SignerId;
use crate::{Error, Result};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// HKDF info string binding derived keys to this protocol
pub const SESSION_KEY_INFO: &[u8] = b"cohort-wallet/signing-session/v1";

/// X25519 public key length
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LENGTH: usize = 12;

/// Poly1305 tag length
pub const TAG_LENGTH: usize = 16;

/// A published X25519 session public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionPublicKey([u8; PUBLIC_KEY_LENGTH]);

impl SessionPublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            Error::Crypto(format!(
                "session public key must be {} bytes, got {}",
                PUBLIC_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SessionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionPublicKey({})", self.to_hex())
    }
}

impl FromStr for SessionPublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for SessionPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<&StaticSecret> for SessionPublicKey {
    fn from(secret: &StaticSecret) -> Self {
        Self(PublicKey::from(secret).to_bytes())
    }
}

// ============================================================================
// Session Key Pair
// ============================================================================

/// Ephemeral key pair owned by exactly one signing round.
///
/// Deriving the cohort secrets consumes the pair, so a pair can never be
/// used for a second round. The secret scalar is zeroized on drop.
pub struct SessionKeyPair {
    secret: StaticSecret,
    public: SessionPublicKey,
}

impl SessionKeyPair {
    /// Generate a fresh key pair from the OS RNG
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = SessionPublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> SessionPublicKey {
        self.public
    }

    /// Derive one shared secret per cohort member, consuming the key pair.
    ///
    /// Members whose published key yields a non-contributory agreement are
    /// left out with a warning; their responses will have no secret and be
    /// discarded during aggregation.
    pub fn derive_for_cohort(self, cohort: &SigningCohort) -> RoundKeys {
        let mut secrets = BTreeMap::new();
        for member in cohort.members() {
            match SharedSecret::agree(&self.secret, &member.session_public_key) {
                Ok(secret) => {
                    secrets.insert(member.signer_id, secret);
                }
                Err(e) => {
                    warn!(signer = %member.signer_id, error = %e, "Skipping cohort member with unusable session key");
                }
            }
        }
        debug!(members = cohort.len(), derived = secrets.len(), "Derived session secrets");

        RoundKeys {
            requester: self.public,
            secrets: SessionSecrets(secrets),
        }
    }
}

impl fmt::Debug for SessionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Key material for one round: the requester's public key and the
/// per-signer secrets derived from it
#[derive(Debug)]
pub struct RoundKeys {
    pub requester: SessionPublicKey,
    pub secrets: SessionSecrets,
}

/// Shared secrets keyed by signer identity
#[derive(Debug, Default)]
pub struct SessionSecrets(BTreeMap<SignerId, SharedSecret>);

impl SessionSecrets {
    pub fn get(&self, signer: &SignerId) -> Option<&SharedSecret> {
        self.0.get(signer)
    }

    pub fn contains(&self, signer: &SignerId) -> bool {
        self.0.contains_key(signer)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn signers(&self) -> impl Iterator<Item = &SignerId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignerId, &SharedSecret)> {
        self.0.iter()
    }
}

// ============================================================================
// Shared Secret
// ============================================================================

/// Symmetric key shared by the requester and one cohort member
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// X25519 agreement followed by HKDF-SHA256.
    ///
    /// Both sides call this: the requester with its ephemeral secret and the
    /// member's public key, the member with its own secret and the
    /// requester's public key.
    pub fn agree(secret: &StaticSecret, peer: &SessionPublicKey) -> Result<Self> {
        let shared = secret.diffie_hellman(&PublicKey::from(*peer.as_bytes()));
        if !shared.was_contributory() {
            return Err(Error::Crypto("non-contributory session key agreement".into()));
        }

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(SESSION_KEY_INFO, &mut okm)
            .map_err(|e| Error::Crypto(format!("HKDF expand failed: {}", e)))?;
        Ok(Self(okm))
    }

    /// Encrypt under a random nonce, returning `nonce || ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new((&self.0).into());

        let nonce_bytes: [u8; NONCE_LENGTH] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut framed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&ciphertext);
        Ok(framed)
    }

    /// Decrypt a `nonce || ciphertext` frame
    pub fn decrypt(&self, framed: &[u8]) -> Result<Vec<u8>> {
        if framed.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(Error::Encryption(format!(
                "ciphertext too short: {} bytes",
                framed.len()
            )));
        }

        let cipher = ChaCha20Poly1305::new((&self.0).into());
        let (nonce_bytes, ciphertext) = framed.split_at(NONCE_LENGTH);

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| Error::Encryption("Decryption failed - wrong key or corrupted data".into()))
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}
