//! Deprecated plaintext signing protocol
//!
//! Older gateways take unencrypted base64 requests and return unencrypted
//! responses. This shim is selected only by explicit configuration and
//! warns on every use. Its results go through the same quorum, ordering
//! and concatenation rules as the encrypted protocol.

use super::aggregate::{SignatureAggregator, check_partial};
use super::client::SigningParams;
use super::gateway::{LegacySigningBatch, LegacySigningGateway};
use super::messages::PartialSignatureResponse;
use crate::account::{SignedOperation, UserOperation};
use crate::types::{SignerId, SigningContext};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Signing client for the plaintext protocol generation
#[derive(Clone)]
pub struct LegacySigningClient {
    gateway: Arc<dyn LegacySigningGateway>,
    params: SigningParams,
    cohort_size: usize,
}

impl LegacySigningClient {
    pub fn new(gateway: Arc<dyn LegacySigningGateway>, params: SigningParams, cohort_size: usize) -> Self {
        Self {
            gateway,
            params,
            cohort_size,
        }
    }

    /// Run a complete plaintext signing round for `operation`
    #[instrument(skip(self, operation, context), fields(sender = %operation.sender()))]
    pub async fn sign(
        &self,
        operation: UserOperation,
        context: &SigningContext,
    ) -> Result<SignedOperation> {
        warn!("Using deprecated plaintext signing protocol; requests are not encrypted");

        let params = &self.params;
        let aggregator = SignatureAggregator::new(params.threshold)?;
        let operation_hash = operation.hash(params.entry_point, params.chain_id)?;

        let signers = self.gateway.fetch_signers(self.cohort_size).await?;
        let request = params.request_for(&operation, context).to_base64()?;

        let batch = LegacySigningBatch {
            signing_requests: signers
                .iter()
                .map(|signer| (signer.to_checksum(), request.clone()))
                .collect(),
            threshold: params.threshold,
        };

        info!(
            requests = batch.signing_requests.len(),
            threshold = params.threshold,
            "Submitting plaintext signing requests"
        );

        let results = self.gateway.submit_plaintext(&batch).await?;
        if results.has_errors() {
            return Err(Error::Gateway(format!(
                "gateway reported signing errors: {}",
                results.errors.unwrap_or_default()
            )));
        }

        let signatures = results
            .signatures
            .ok_or_else(|| Error::NoSignatures("response has no signatures".into()))?;
        if signatures.is_empty() {
            return Err(Error::EmptyResponse);
        }

        let partials = decode_legacy_signatures(&signatures, operation_hash);
        let signature = aggregator.combine(partials)?;

        info!(
            operation_hash = %operation_hash,
            signers = ?signature.signers(),
            "Combined threshold signature (plaintext protocol)"
        );

        Ok(SignedOperation::new(operation, signature, operation_hash))
    }
}

/// Decode `{signer: [signer, base64Response]}` entries, discarding bad ones
fn decode_legacy_signatures(
    signatures: &BTreeMap<String, Vec<String>>,
    operation_hash: alloy_primitives::B256,
) -> Vec<PartialSignatureResponse> {
    let mut partials = Vec::with_capacity(signatures.len());

    for (key, entry) in signatures {
        let Ok(signer) = key.parse::<SignerId>() else {
            warn!(signer = %key, "Discarding signature with malformed signer id");
            continue;
        };
        let Some(encoded) = entry.get(1) else {
            warn!(%signer, "Discarding signature entry without response payload");
            continue;
        };
        let partial = match PartialSignatureResponse::from_base64(encoded) {
            Ok(partial) => partial,
            Err(e) => {
                warn!(%signer, error = %e, "Discarding undecodable signature response");
                continue;
            }
        };
        if let Err(reason) = check_partial(signer, &partial, Some(operation_hash)) {
            warn!(%signer, reason, "Discarding inconsistent signature response");
            continue;
        }
        partials.push(partial);
    }

    partials
}

impl std::fmt::Debug for LegacySigningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacySigningClient")
            .field("params", &self.params)
            .field("cohort_size", &self.cohort_size)
            .finish()
    }
}
