//! Partial signature validation, ordering and combination

use super::client::RoundResponses;
use super::messages::PartialSignatureResponse;
use super::session::SessionSecrets;
use crate::account::{CombinedSignature, SignedOperation, UserOperation};
use crate::types::{SIGNATURE_LENGTH, SignerId};
use crate::{Error, Result};
use alloy_primitives::B256;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Turns a round's responses into one positional combined signature.
///
/// Trust comes from the quorum count. Signatures are not verified against
/// the operation hash locally; the signed hash is logged for audit instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAggregator {
    threshold: usize,
}

impl SignatureAggregator {
    pub fn new(threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::Configuration("threshold must be at least 1".into()));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Decrypt and validate every sealed response.
    ///
    /// A response that cannot be used is discarded with a warning rather
    /// than failing the round. Returns at most one response per signer.
    pub fn collect(
        &self,
        responses: &BTreeMap<String, String>,
        secrets: &SessionSecrets,
        operation_hash: Option<B256>,
    ) -> Vec<PartialSignatureResponse> {
        let mut accepted: BTreeMap<SignerId, PartialSignatureResponse> = BTreeMap::new();

        for (key, encoded) in responses {
            let signer: SignerId = match key.parse() {
                Ok(signer) => signer,
                Err(_) => {
                    warn!(signer = %key, "Discarding response with malformed signer id");
                    continue;
                }
            };

            let Some(secret) = secrets.get(&signer) else {
                warn!(%signer, "Discarding response from signer with no session secret");
                continue;
            };

            let partial = match PartialSignatureResponse::open(encoded, secret) {
                Ok(partial) => partial,
                Err(e) => {
                    warn!(%signer, error = %e, "Discarding undecryptable response");
                    continue;
                }
            };

            if let Err(reason) = check_partial(signer, &partial, operation_hash) {
                warn!(%signer, reason, "Discarding inconsistent response");
                continue;
            }

            if accepted.contains_key(&signer) {
                warn!(%signer, "Discarding duplicate response");
                continue;
            }
            accepted.insert(signer, partial);
        }

        debug!(
            received = responses.len(),
            accepted = accepted.len(),
            "Collected partial signatures"
        );
        accepted.into_values().collect()
    }

    /// Enforce quorum, sort ascending by signer id and concatenate exactly
    /// `threshold` signatures
    pub fn combine(&self, partials: Vec<PartialSignatureResponse>) -> Result<CombinedSignature> {
        let mut by_signer: BTreeMap<SignerId, Vec<u8>> = BTreeMap::new();
        for partial in partials {
            by_signer.entry(partial.signer).or_insert(partial.signature);
        }

        if by_signer.len() < self.threshold {
            return Err(Error::QuorumNotMet {
                required: self.threshold,
                actual: by_signer.len(),
            });
        }

        // BTreeMap iterates in ascending SignerId order
        let ordered: Vec<(SignerId, Vec<u8>)> =
            by_signer.into_iter().take(self.threshold).collect();

        CombinedSignature::from_ordered(ordered)
    }

    /// Run collection and combination for a whole round
    #[instrument(skip(self, operation, round), fields(round_id = %round.round_id))]
    pub fn aggregate(
        &self,
        operation: UserOperation,
        operation_hash: B256,
        round: RoundResponses,
    ) -> Result<SignedOperation> {
        let partials = self.collect(&round.responses, &round.secrets, Some(operation_hash));
        // The round's secrets are dropped (and zeroized) here
        drop(round);

        let signature = self.combine(partials)?;

        info!(
            operation_hash = %operation_hash,
            signers = ?signature.signers(),
            signature_len = signature.len(),
            "Combined threshold signature"
        );

        Ok(SignedOperation::new(operation, signature, operation_hash))
    }
}

/// Internal consistency of a decrypted response
pub(crate) fn check_partial(
    claimed: SignerId,
    partial: &PartialSignatureResponse,
    operation_hash: Option<B256>,
) -> std::result::Result<(), &'static str> {
    if partial.signer != claimed {
        return Err("signer in payload does not match response key");
    }
    if partial.signature.len() != SIGNATURE_LENGTH {
        return Err("signature has wrong length");
    }
    if let Some(hash) = operation_hash {
        if partial.message_hash != partial.kind.signed_digest(hash) {
            return Err("signed hash does not match operation");
        }
    }
    Ok(())
}
