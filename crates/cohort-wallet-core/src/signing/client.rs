//! Encrypted signing-request transport

use super::gateway::{SigningBatch, SigningGateway};
use super::messages::{EncryptedSigningRequest, PROTOCOL_VERSION, SigningRequest};
use super::session::{SessionKeyPair, SessionSecrets};
use crate::account::UserOperation;
use crate::config::{AaVersion, WalletConfig};
use crate::types::SigningContext;
use crate::{Error, Result};
use alloy_primitives::Address;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Fixed parameters of every signing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningParams {
    pub cohort_id: u64,
    pub chain_id: u64,
    pub entry_point: Address,
    pub threshold: usize,
    pub aa_version: AaVersion,
}

impl SigningParams {
    pub fn from_config(config: &WalletConfig) -> Self {
        Self {
            cohort_id: config.cohort_id,
            chain_id: config.chain_id.0,
            entry_point: config.entry_point,
            threshold: config.threshold,
            aa_version: config.aa_version,
        }
    }

    /// Request payload for `operation` under `context`
    pub fn request_for(&self, operation: &UserOperation, context: &SigningContext) -> SigningRequest {
        SigningRequest {
            operation: operation.clone(),
            entry_point: self.entry_point,
            chain_id: self.chain_id,
            cohort_id: self.cohort_id,
            threshold: self.threshold,
            aa_version: self.aa_version,
            protocol_version: PROTOCOL_VERSION.to_string(),
            context: context.clone(),
        }
    }
}

/// Everything a round needs to aggregate its responses.
///
/// Owns the round's shared secrets; dropping it zeroizes them.
#[derive(Debug)]
pub struct RoundResponses {
    pub round_id: Uuid,
    pub secrets: SessionSecrets,
    /// Signer id (as sent by the gateway) -> base64 sealed response
    pub responses: BTreeMap<String, String>,
}

/// Sends one encrypted request per cohort member and collects the replies
#[derive(Clone)]
pub struct ThresholdSigningClient {
    gateway: Arc<dyn SigningGateway>,
    params: SigningParams,
}

impl ThresholdSigningClient {
    pub fn new(gateway: Arc<dyn SigningGateway>, params: SigningParams) -> Self {
        Self { gateway, params }
    }

    pub fn params(&self) -> &SigningParams {
        &self.params
    }

    /// Run the request half of a signing round.
    ///
    /// Fetches the cohort, seals the request for every member under a fresh
    /// session key and submits the batch. No retries: any failure aborts
    /// the round.
    #[instrument(skip(self, operation, context), fields(sender = %operation.sender()))]
    pub async fn request_signatures(
        &self,
        operation: &UserOperation,
        context: &SigningContext,
    ) -> Result<RoundResponses> {
        let round_id = Uuid::new_v4();
        let params = &self.params;

        let cohort = self
            .gateway
            .fetch_cohort(params.cohort_id, params.chain_id)
            .await?;
        if cohort.len() < params.threshold {
            return Err(Error::QuorumNotMet {
                required: params.threshold,
                actual: cohort.len(),
            });
        }
        debug!(%round_id, members = cohort.len(), "Fetched signing cohort");

        let keys = SessionKeyPair::generate().derive_for_cohort(&cohort);
        let plaintext = params.request_for(operation, context).to_bytes()?;

        let mut encrypted_signing_requests = BTreeMap::new();
        for (signer, secret) in keys.secrets.iter() {
            let sealed = EncryptedSigningRequest::seal(&plaintext, keys.requester, secret)?;
            encrypted_signing_requests.insert(signer.to_checksum(), sealed.to_base64());
        }

        let batch = SigningBatch {
            encrypted_signing_requests,
            threshold: params.threshold,
        };

        info!(
            %round_id,
            cohort_id = params.cohort_id,
            requests = batch.encrypted_signing_requests.len(),
            threshold = params.threshold,
            "Submitting encrypted signing requests"
        );

        let results = self.gateway.submit(&batch).await?;

        if results.has_errors() {
            return Err(Error::Gateway(format!(
                "gateway reported signing errors: {}",
                results.errors.unwrap_or_default()
            )));
        }

        let responses = results.encrypted_signature_responses.ok_or_else(|| {
            Error::NoSignatures("response has no encrypted_signature_responses".into())
        })?;
        if responses.is_empty() {
            return Err(Error::EmptyResponse);
        }

        debug!(%round_id, responses = responses.len(), "Received encrypted signature responses");

        Ok(RoundResponses {
            round_id,
            secrets: keys.secrets,
            responses,
        })
    }
}

impl std::fmt::Debug for ThresholdSigningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdSigningClient")
            .field("params", &self.params)
            .finish()
    }
}
