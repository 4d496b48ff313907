//! Invariant tests for signing rounds
//!
//! These tests verify guarantees that must hold on every round:
//! 1. A combined signature is exactly threshold * 65 bytes
//! 2. Every round uses a fresh session key, shared by all its requests
//! 3. A signed operation keeps the sender it was built with
//! 4. Nothing is submitted without quorum

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use cohort_wallet_core::chain::MemoryChain;
use cohort_wallet_core::bundler::MemoryBundler;
use cohort_wallet_core::signing::{
    EncryptedSigningRequest, MemoryGateway, SessionPublicKey, SignatureAggregator, SignerBehaviour,
    SigningBatch, SigningCohort, SigningGateway, SigningParams, SigningResults,
    ThresholdSigningClient,
};
use cohort_wallet_core::types::SIGNATURE_LENGTH;
use cohort_wallet_core::{
    ENTRY_POINT_V07, Error, OperationBuilder, Result, SigningContext, SmartWallet,
    TransferRequest, UserOperation, WalletConfig,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Gateway wrapper that records the requester key of every sealed request
#[derive(Clone)]
struct RecordingGateway {
    inner: MemoryGateway,
    requesters: Arc<Mutex<Vec<Vec<SessionPublicKey>>>>,
}

impl RecordingGateway {
    fn new(inner: MemoryGateway) -> Self {
        Self {
            inner,
            requesters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn rounds(&self) -> Vec<Vec<SessionPublicKey>> {
        self.requesters.lock().clone()
    }
}

#[async_trait]
impl SigningGateway for RecordingGateway {
    async fn fetch_cohort(&self, cohort_id: u64, chain_id: u64) -> Result<SigningCohort> {
        self.inner.fetch_cohort(cohort_id, chain_id).await
    }

    async fn submit(&self, batch: &SigningBatch) -> Result<SigningResults> {
        let keys = batch
            .encrypted_signing_requests
            .values()
            .map(|sealed| EncryptedSigningRequest::from_base64(sealed).map(|e| e.requester()))
            .collect::<Result<Vec<_>>>()?;
        self.requesters.lock().push(keys);
        self.inner.submit(batch).await
    }
}

fn params(threshold: usize) -> SigningParams {
    let mut config = WalletConfig::base_sepolia(1, "http://bundler.invalid");
    config.threshold = threshold;
    config.cohort_size = 5;
    config.smart_account = Some(Address::repeat_byte(0x5a));
    SigningParams::from_config(&config)
}

fn operation() -> UserOperation {
    OperationBuilder::new(Address::repeat_byte(0x5a), U256::from(9u8))
        .call(Address::repeat_byte(0xaa), U256::from(1u8), &[])
}

// ============================================================================
// Invariant 1: Combined signature length
// ============================================================================

#[tokio::test]
async fn invariant_signature_length_is_threshold_times_65() {
    let gateway: Arc<dyn SigningGateway> = Arc::new(MemoryGateway::honest(5));

    for threshold in 1..=5 {
        let params = params(threshold);
        let op = operation();
        let hash = op.hash(ENTRY_POINT_V07, params.chain_id).unwrap();

        let round = ThresholdSigningClient::new(gateway.clone(), params)
            .request_signatures(&op, &SigningContext::new())
            .await
            .unwrap();
        let signed = SignatureAggregator::new(threshold)
            .unwrap()
            .aggregate(op, hash, round)
            .unwrap();

        assert_eq!(
            signed.signature().len(),
            threshold * SIGNATURE_LENGTH,
            "threshold {}",
            threshold
        );
        assert_eq!(signed.signature().signers().len(), threshold);
    }
}

// ============================================================================
// Invariant 2: Session key freshness
// ============================================================================

#[tokio::test]
async fn invariant_fresh_session_key_per_round() {
    let gateway = RecordingGateway::new(MemoryGateway::honest(3));
    let client = ThresholdSigningClient::new(Arc::new(gateway.clone()), params(2));

    for _ in 0..5 {
        client
            .request_signatures(&operation(), &SigningContext::new())
            .await
            .unwrap();
    }

    let rounds = gateway.rounds();
    assert_eq!(rounds.len(), 5);

    let mut seen = HashSet::new();
    for keys in rounds {
        // One requester key per round, used for every member
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| *k == keys[0]));
        assert!(seen.insert(keys[0]), "session key reused across rounds");
    }
}

// ============================================================================
// Invariant 3: Sender binding
// ============================================================================

#[tokio::test]
async fn invariant_signed_operation_keeps_sender_and_hash() {
    let gateway = MemoryGateway::honest(3);
    let params = params(2);
    let op = operation();
    let hash = op.hash(ENTRY_POINT_V07, params.chain_id).unwrap();

    let round = ThresholdSigningClient::new(Arc::new(gateway), params)
        .request_signatures(&op, &SigningContext::new())
        .await
        .unwrap();
    let signed = SignatureAggregator::new(2)
        .unwrap()
        .aggregate(op.clone(), hash, round)
        .unwrap();

    assert_eq!(signed.operation().sender(), op.sender());
    assert_eq!(signed.operation(), &op);
    assert_eq!(signed.hash(), hash);
}

// ============================================================================
// Invariant 4: No submission without quorum
// ============================================================================

#[tokio::test]
async fn invariant_no_submission_without_quorum() {
    let behaviours = [
        [SignerBehaviour::Silent, SignerBehaviour::Silent, SignerBehaviour::Honest],
        [SignerBehaviour::GarbageCiphertext, SignerBehaviour::WrongHash, SignerBehaviour::Honest],
        [SignerBehaviour::GarbageCiphertext, SignerBehaviour::GarbageCiphertext, SignerBehaviour::Silent],
    ];

    for behaviour in behaviours {
        let chain = MemoryChain::new();
        chain.set_balance(Address::repeat_byte(0x5a), U256::from(10u64).pow(U256::from(18u64)));
        let bundler = MemoryBundler::new();

        let mut config = WalletConfig::base_sepolia(1, "http://bundler.invalid");
        config.smart_account = Some(Address::repeat_byte(0x5a));
        let wallet = SmartWallet::new(
            config,
            Arc::new(chain),
            Arc::new(bundler.clone()),
            Arc::new(MemoryGateway::new(&behaviour)),
        )
        .unwrap();

        let result = wallet
            .send_native(
                &TransferRequest::new("1", "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "0.01"),
                &SigningContext::new(),
            )
            .await;

        assert!(
            matches!(result, Err(Error::QuorumNotMet { .. }) | Err(Error::EmptyResponse)),
            "{:?} returned {:?}",
            behaviour,
            result
        );
        assert_eq!(bundler.sent_count(), 0);
    }
}
