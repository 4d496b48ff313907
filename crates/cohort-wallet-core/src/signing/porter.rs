//! HTTP signing gateway (Porter)
//!
//! Cohort membership lives in the on-chain coordinator. The gateway proxies
//! that read: `GET /signing_cohort?cohort_id=&chain_id=` returns the members
//! the coordinator lists for the cohort, with their session public keys, so
//! the wallet needs no coordinator ABI or second RPC endpoint.

use super::gateway::{
    CohortMember, LegacySigningBatch, LegacySigningGateway, LegacySigningResults, SigningBatch,
    SigningCohort, SigningGateway, SigningResults,
};
use crate::types::SignerId;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Gateway path proxying the coordinator's cohort read
pub const SIGNING_COHORT_PATH: &str = "signing_cohort";

/// Signing gateway reached over HTTP.
///
/// Every failure to reach it, a non-2xx status or an unparseable body is
/// reported as [`Error::Gateway`]. Nothing is retried.
#[derive(Debug, Clone)]
pub struct PorterGateway {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CohortResult {
    cohort: CohortBody,
}

#[derive(Deserialize)]
struct CohortBody {
    members: Vec<CohortMember>,
}

#[derive(Deserialize)]
struct SignResult<T> {
    signing_results: T,
}

#[derive(Deserialize)]
struct UrsulasResult {
    ursulas: Vec<Ursula>,
}

#[derive(Deserialize)]
struct Ursula {
    checksum_address: String,
}

impl PorterGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gateway(format!("{} returned {}: {}", what, status, body)));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Gateway(format!("unparseable {} response: {}", what, e)))
    }
}

#[async_trait]
impl SigningGateway for PorterGateway {
    async fn fetch_cohort(&self, cohort_id: u64, chain_id: u64) -> Result<SigningCohort> {
        let response = self
            .client
            .get(self.url(SIGNING_COHORT_PATH))
            .query(&[("cohort_id", cohort_id), ("chain_id", chain_id)])
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("cohort request failed: {}", e)))?;

        let envelope: Envelope<CohortResult> = Self::read(response, SIGNING_COHORT_PATH).await?;
        debug!(cohort_id, members = envelope.result.cohort.members.len(), "Fetched cohort");
        Ok(SigningCohort::new(envelope.result.cohort.members))
    }

    async fn submit(&self, batch: &SigningBatch) -> Result<SigningResults> {
        let response = self
            .client
            .post(self.url("sign"))
            .json(batch)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("sign request failed: {}", e)))?;

        let envelope: Envelope<SignResult<SigningResults>> = Self::read(response, "sign").await?;
        Ok(envelope.result.signing_results)
    }
}

#[async_trait]
impl LegacySigningGateway for PorterGateway {
    async fn fetch_signers(&self, quantity: usize) -> Result<Vec<SignerId>> {
        let response = self
            .client
            .get(self.url("get_ursulas"))
            .query(&[("quantity", quantity)])
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("get_ursulas request failed: {}", e)))?;

        let envelope: Envelope<UrsulasResult> = Self::read(response, "get_ursulas").await?;
        envelope
            .result
            .ursulas
            .iter()
            .map(|u| {
                u.checksum_address
                    .parse()
                    .map_err(|_| Error::Gateway(format!("bad signer address {}", u.checksum_address)))
            })
            .collect()
    }

    async fn submit_plaintext(&self, batch: &LegacySigningBatch) -> Result<LegacySigningResults> {
        let response = self
            .client
            .post(self.url("sign"))
            .json(batch)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("sign request failed: {}", e)))?;

        let envelope: Envelope<SignResult<LegacySigningResults>> =
            Self::read(response, "sign").await?;
        Ok(envelope.result.signing_results)
    }
}
