//! Signing gateway interface
//!
//! The gateway fans a batch of per-member requests out to the cohort and
//! returns whatever came back. It only ever sees ciphertext.

use super::session::SessionPublicKey;
use crate::Result;
use crate::types::SignerId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cohort member and its current session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortMember {
    pub signer_id: SignerId,
    pub session_public_key: SessionPublicKey,
}

/// Cohort membership snapshot for a single round.
///
/// Members are kept in ascending signer order with duplicates dropped.
/// Snapshots are never cached across rounds since session keys rotate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningCohort {
    members: Vec<CohortMember>,
}

impl SigningCohort {
    pub fn new(mut members: Vec<CohortMember>) -> Self {
        members.sort_by_key(|m| m.signer_id);
        members.dedup_by_key(|m| m.signer_id);
        Self { members }
    }

    pub fn members(&self) -> &[CohortMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn signer_ids(&self) -> impl Iterator<Item = SignerId> + '_ {
        self.members.iter().map(|m| m.signer_id)
    }
}

/// Batched encrypted request, in gateway wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningBatch {
    /// Checksummed signer id -> base64 sealed request
    pub encrypted_signing_requests: BTreeMap<String, String>,
    pub threshold: usize,
}

/// `signing_results` part of a gateway response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigningResults {
    /// Signer id -> base64 sealed response; absent when nothing came back
    #[serde(default)]
    pub encrypted_signature_responses: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl SigningResults {
    /// Whether the gateway reported any per-member error
    pub fn has_errors(&self) -> bool {
        errors_present(self.errors.as_ref())
    }
}

/// Transport for the encrypted signing protocol
#[async_trait]
pub trait SigningGateway: Send + Sync {
    /// Current members of `cohort_id` on `chain_id`, with session keys
    async fn fetch_cohort(&self, cohort_id: u64, chain_id: u64) -> Result<SigningCohort>;

    /// Submit a batch and return the members' sealed responses
    async fn submit(&self, batch: &SigningBatch) -> Result<SigningResults>;
}

// ============================================================================
// Legacy plaintext protocol
// ============================================================================

/// Batched plaintext request, in legacy wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySigningBatch {
    /// Checksummed signer id -> base64 plaintext request
    pub signing_requests: BTreeMap<String, String>,
    pub threshold: usize,
}

/// `signing_results` part of a legacy gateway response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySigningResults {
    /// Signer id -> `[signer id, base64 response]`
    #[serde(default)]
    pub signatures: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

impl LegacySigningResults {
    pub fn has_errors(&self) -> bool {
        errors_present(self.errors.as_ref())
    }
}

/// Transport for the deprecated plaintext protocol
#[async_trait]
pub trait LegacySigningGateway: Send + Sync {
    /// Discover `quantity` signers
    async fn fetch_signers(&self, quantity: usize) -> Result<Vec<SignerId>>;

    /// Submit plaintext requests
    async fn submit_plaintext(&self, batch: &LegacySigningBatch) -> Result<LegacySigningResults>;
}

fn errors_present(errors: Option<&serde_json::Value>) -> bool {
    match errors {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Array(items)) => !items.is_empty(),
        Some(serde_json::Value::Object(map)) => !map.is_empty(),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
