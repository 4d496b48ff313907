//! Fuzz tests for signature aggregation
//!
//! Property-based testing of ordering, truncation and quorum.

use alloy_primitives::{Address, B256};
use cohort_wallet_core::Error;
use cohort_wallet_core::signing::{PartialSignatureResponse, SignatureAggregator, SignatureKind};
use cohort_wallet_core::types::{SIGNATURE_LENGTH, SignerId};
use proptest::prelude::*;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Distinct signer ids, plus the same ids in a shuffled arrival order
fn arrivals_strategy(max: usize) -> impl Strategy<Value = (Vec<SignerId>, Vec<SignerId>)> {
    prop::collection::btree_set(any::<[u8; 20]>(), 1..=max).prop_flat_map(|set| {
        let ids: Vec<SignerId> = set.into_iter().map(|b| SignerId(Address::from(b))).collect();
        (Just(ids.clone()), Just(ids).prop_shuffle())
    })
}

/// Signature bytes derived from the signer so positions can be checked
fn partial(id: SignerId) -> PartialSignatureResponse {
    let mut signature = Vec::with_capacity(SIGNATURE_LENGTH);
    while signature.len() < SIGNATURE_LENGTH {
        signature.extend_from_slice(id.as_bytes());
    }
    signature.truncate(SIGNATURE_LENGTH);
    PartialSignatureResponse {
        signer: id,
        signature,
        kind: SignatureKind::UserOperation,
        message_hash: B256::ZERO,
    }
}

// ============================================================================
// Aggregation Properties
// ============================================================================

proptest! {
    /// Arrival order never changes the combined signature
    #[test]
    fn combination_is_order_independent(
        (sorted, shuffled) in arrivals_strategy(8),
        threshold in 1usize..=8,
    ) {
        prop_assume!(threshold <= sorted.len());
        let aggregator = SignatureAggregator::new(threshold).unwrap();

        let from_sorted = aggregator.combine(sorted.iter().copied().map(partial).collect()).unwrap();
        let from_shuffled = aggregator.combine(shuffled.iter().copied().map(partial).collect()).unwrap();
        prop_assert_eq!(from_sorted.as_bytes(), from_shuffled.as_bytes());

        // Exactly the lowest `threshold` ids, ascending
        let expected: Vec<u8> = sorted
            .iter()
            .take(threshold)
            .flat_map(|id| partial(*id).signature)
            .collect();
        prop_assert_eq!(from_shuffled.as_bytes(), expected.as_slice());
        prop_assert_eq!(from_shuffled.signers(), &sorted[..threshold]);
    }

    /// Below quorum is always a typed quorum failure
    #[test]
    fn below_quorum_always_fails(
        (ids, _) in arrivals_strategy(6),
        extra in 1usize..4,
    ) {
        let threshold = ids.len() + extra;
        let err = SignatureAggregator::new(threshold)
            .unwrap()
            .combine(ids.iter().copied().map(partial).collect())
            .unwrap_err();
        match err {
            Error::QuorumNotMet { required, actual } => {
                prop_assert_eq!(required, threshold);
                prop_assert_eq!(actual, ids.len());
            }
            other => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Duplicated responses do not inflate the quorum count
    #[test]
    fn duplicates_do_not_count(
        (ids, _) in arrivals_strategy(5),
        copies in 2usize..4,
    ) {
        let partials: Vec<_> = ids
            .iter()
            .flat_map(|id| std::iter::repeat_n(partial(*id), copies))
            .collect();
        let result = SignatureAggregator::new(ids.len() + 1).unwrap().combine(partials);
        let is_quorum_failure = matches!(result, Err(Error::QuorumNotMet { .. }));
        prop_assert!(is_quorum_failure);
    }

    /// Combined length is always threshold * 65
    #[test]
    fn combined_length_is_fixed(
        (ids, _) in arrivals_strategy(8),
        threshold in 1usize..=8,
    ) {
        prop_assume!(threshold <= ids.len());
        let combined = SignatureAggregator::new(threshold)
            .unwrap()
            .combine(ids.into_iter().map(partial).collect())
            .unwrap();
        prop_assert_eq!(combined.len(), threshold * SIGNATURE_LENGTH);
    }
}
