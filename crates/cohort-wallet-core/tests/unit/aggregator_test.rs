//! Unit tests for signature aggregation
//!
//! Responses are sealed the way cohort members seal them, then run through
//! collection and combination.

use alloy_primitives::{Address, B256};
use cohort_wallet_core::signing::{
    CohortMember, PartialSignatureResponse, SessionKeyPair, SessionPublicKey, SessionSecrets,
    SharedSecret, SignatureAggregator, SignatureKind, SigningCohort,
};
use cohort_wallet_core::types::{SIGNATURE_LENGTH, SignerId};
use cohort_wallet_core::Error;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use x25519_dalek::StaticSecret;

struct Member {
    id: SignerId,
    secret: StaticSecret,
}

/// A cohort of members with ids `0x0101..`, `0x0202..`, ...
fn cohort(bytes: &[u8]) -> (Vec<Member>, SessionPublicKey, SessionSecrets) {
    let members: Vec<Member> = bytes
        .iter()
        .map(|b| Member {
            id: SignerId(Address::repeat_byte(*b)),
            secret: StaticSecret::random_from_rng(OsRng),
        })
        .collect();
    let cohort = SigningCohort::new(
        members
            .iter()
            .map(|m| CohortMember {
                signer_id: m.id,
                session_public_key: SessionPublicKey::from(&m.secret),
            })
            .collect(),
    );
    let keys = SessionKeyPair::generate().derive_for_cohort(&cohort);
    (members, keys.requester, keys.secrets)
}

fn partial(id: SignerId, hash: B256) -> PartialSignatureResponse {
    PartialSignatureResponse {
        signer: id,
        signature: vec![id.0[0]; SIGNATURE_LENGTH],
        kind: SignatureKind::UserOperation,
        message_hash: hash,
    }
}

fn seal(member: &Member, requester: &SessionPublicKey, response: &PartialSignatureResponse) -> String {
    let secret = SharedSecret::agree(&member.secret, requester).unwrap();
    response.seal(&secret).unwrap()
}

// ============================================================================
// Collection
// ============================================================================

#[test]
fn test_collect_accepts_valid_responses() {
    let hash = B256::repeat_byte(0x77);
    let (members, requester, secrets) = cohort(&[1, 2, 3]);

    let responses: BTreeMap<String, String> = members
        .iter()
        .map(|m| (m.id.to_checksum(), seal(m, &requester, &partial(m.id, hash))))
        .collect();

    let aggregator = SignatureAggregator::new(2).unwrap();
    let collected = aggregator.collect(&responses, &secrets, Some(hash));
    assert_eq!(collected.len(), 3);
}

#[test]
fn test_collect_discards_bad_responses() {
    let hash = B256::repeat_byte(0x77);
    let (members, requester, secrets) = cohort(&[1, 2, 3, 4, 5]);

    let mut responses = BTreeMap::new();
    // Valid
    responses.insert(
        members[0].id.to_checksum(),
        seal(&members[0], &requester, &partial(members[0].id, hash)),
    );
    // Garbage ciphertext
    responses.insert(members[1].id.to_checksum(), "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into());
    // Payload claims another signer
    responses.insert(
        members[2].id.to_checksum(),
        seal(&members[2], &requester, &partial(members[0].id, hash)),
    );
    // Signed some other hash
    responses.insert(
        members[3].id.to_checksum(),
        seal(&members[3], &requester, &partial(members[3].id, B256::repeat_byte(0x01))),
    );
    // Truncated signature
    let mut short = partial(members[4].id, hash);
    short.signature.truncate(64);
    responses.insert(members[4].id.to_checksum(), seal(&members[4], &requester, &short));
    // Not in the cohort at all
    responses.insert(
        SignerId(Address::repeat_byte(0x09)).to_checksum(),
        seal(&members[0], &requester, &partial(members[0].id, hash)),
    );
    // Not an address
    responses.insert("ursula-7".into(), "AAAA".into());

    let collected = SignatureAggregator::new(1)
        .unwrap()
        .collect(&responses, &secrets, Some(hash));
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].signer, members[0].id);
}

#[test]
fn test_collect_accepts_personal_sign_digest() {
    let hash = B256::repeat_byte(0x77);
    let (members, requester, secrets) = cohort(&[1]);

    let mut response = partial(members[0].id, SignatureKind::Eip191.signed_digest(hash));
    response.kind = SignatureKind::Eip191;

    let responses = BTreeMap::from([(members[0].id.to_checksum(), seal(&members[0], &requester, &response))]);
    let collected = SignatureAggregator::new(1)
        .unwrap()
        .collect(&responses, &secrets, Some(hash));
    assert_eq!(collected.len(), 1);
}

#[test]
fn test_collect_without_hash_check() {
    let (members, requester, secrets) = cohort(&[1]);
    let response = partial(members[0].id, B256::repeat_byte(0x42));

    let responses = BTreeMap::from([(members[0].id.to_checksum(), seal(&members[0], &requester, &response))]);
    let collected = SignatureAggregator::new(1)
        .unwrap()
        .collect(&responses, &secrets, None);
    assert_eq!(collected.len(), 1);
}

// ============================================================================
// Combination
// ============================================================================

#[test]
fn test_zero_threshold_rejected() {
    assert!(matches!(SignatureAggregator::new(0), Err(Error::Configuration(_))));
}

#[test]
fn test_combine_sorts_ascending_regardless_of_arrival() {
    let hash = B256::ZERO;
    let ids: Vec<SignerId> = [0x30u8, 0x10, 0x20]
        .iter()
        .map(|b| SignerId(Address::repeat_byte(*b)))
        .collect();
    let partials: Vec<_> = ids.iter().map(|id| partial(*id, hash)).collect();

    let combined = SignatureAggregator::new(3).unwrap().combine(partials).unwrap();

    let mut expected = vec![0x10u8; SIGNATURE_LENGTH];
    expected.extend(vec![0x20u8; SIGNATURE_LENGTH]);
    expected.extend(vec![0x30u8; SIGNATURE_LENGTH]);
    assert_eq!(combined.as_bytes(), expected.as_slice());
    assert_eq!(
        combined.signers(),
        &[
            SignerId(Address::repeat_byte(0x10)),
            SignerId(Address::repeat_byte(0x20)),
            SignerId(Address::repeat_byte(0x30)),
        ]
    );
}

#[test]
fn test_combine_truncates_to_threshold() {
    let partials: Vec<_> = [0x04u8, 0x01, 0x03, 0x02]
        .iter()
        .map(|b| partial(SignerId(Address::repeat_byte(*b)), B256::ZERO))
        .collect();

    let combined = SignatureAggregator::new(2).unwrap().combine(partials).unwrap();
    assert_eq!(combined.len(), 2 * SIGNATURE_LENGTH);
    assert_eq!(&combined.as_bytes()[..SIGNATURE_LENGTH], &[0x01u8; SIGNATURE_LENGTH][..]);
    assert_eq!(&combined.as_bytes()[SIGNATURE_LENGTH..], &[0x02u8; SIGNATURE_LENGTH][..]);
}

#[test]
fn test_combine_below_quorum_fails() {
    let partials = vec![partial(SignerId(Address::repeat_byte(0x01)), B256::ZERO)];
    let err = SignatureAggregator::new(2).unwrap().combine(partials).unwrap_err();
    assert!(matches!(err, Error::QuorumNotMet { required: 2, actual: 1 }));
}

#[test]
fn test_combine_with_nothing_fails_with_quorum() {
    let err = SignatureAggregator::new(2).unwrap().combine(vec![]).unwrap_err();
    assert!(matches!(err, Error::QuorumNotMet { required: 2, actual: 0 }));
}

#[test]
fn test_duplicate_signers_count_once() {
    let id = SignerId(Address::repeat_byte(0x01));
    let partials = vec![partial(id, B256::ZERO), partial(id, B256::ZERO)];
    let err = SignatureAggregator::new(2).unwrap().combine(partials).unwrap_err();
    assert!(matches!(err, Error::QuorumNotMet { required: 2, actual: 1 }));
}
