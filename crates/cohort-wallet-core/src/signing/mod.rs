//! # Threshold Signing
//!
//! Obtains a combined signature for an operation from an external signer
//! cohort.
//!
//! ## Round
//!
//! 1. Fetch the cohort and each member's session public key
//! 2. Generate an ephemeral session key and derive one secret per member
//! 3. Seal the request for every member and submit the batch
//! 4. Decrypt and validate the responses, enforce quorum, sort ascending
//!    by signer id and concatenate exactly `threshold` signatures
//!
//! The session key pair and its secrets live only for that round.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cohort_wallet_core::signing::{SignatureAggregator, SigningParams, ThresholdSigningClient};
//!
//! let client = ThresholdSigningClient::new(gateway, SigningParams::from_config(&config));
//! let round = client.request_signatures(&operation, &context).await?;
//!
//! let hash = operation.hash(config.entry_point, config.chain_id.0)?;
//! let signed = SignatureAggregator::new(config.threshold)?.aggregate(operation, hash, round)?;
//! ```

pub mod aggregate;
pub mod client;
pub mod gateway;
pub mod legacy;
pub mod memory;
pub mod messages;
#[cfg(feature = "runtime")]
pub mod porter;
pub mod session;

pub use aggregate::SignatureAggregator;
pub use client::{RoundResponses, SigningParams, ThresholdSigningClient};
pub use gateway::{
    CohortMember, LegacySigningBatch, LegacySigningGateway, LegacySigningResults, SigningBatch,
    SigningCohort, SigningGateway, SigningResults,
};
pub use legacy::LegacySigningClient;
pub use memory::{MemoryGateway, SignerBehaviour};
pub use messages::{
    EncryptedSigningRequest, PROTOCOL_VERSION, PartialSignatureResponse, SignatureKind,
    SigningRequest,
};
#[cfg(feature = "runtime")]
pub use porter::PorterGateway;
pub use session::{RoundKeys, SessionKeyPair, SessionPublicKey, SessionSecrets, SharedSecret};
