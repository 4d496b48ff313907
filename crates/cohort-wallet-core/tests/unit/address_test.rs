//! Unit tests for CREATE2 account derivation

use alloy_primitives::{Address, B256, U256};
use cohort_wallet_core::Error;
use cohort_wallet_core::account::{AddressResolver, parse_identifier};

fn resolver() -> AddressResolver {
    AddressResolver::new(
        "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985".parse().unwrap(),
        B256::repeat_byte(0x5c),
    )
}

// ============================================================================
// Identifier Parsing
// ============================================================================

#[test]
fn test_identifier_parses_as_decimal() {
    assert_eq!(parse_identifier("0").unwrap(), U256::ZERO);
    assert_eq!(parse_identifier("42").unwrap(), U256::from(42u64));
    assert_eq!(
        parse_identifier("1234567890123456789012345678901234567890").unwrap(),
        U256::from_str_radix("1234567890123456789012345678901234567890", 10).unwrap()
    );
}

#[test]
fn test_invalid_identifiers_rejected() {
    for bad in ["", "-1", "abc", "1.5", " 42", "0x2a", "4 2"] {
        assert!(
            matches!(parse_identifier(bad), Err(Error::InvalidIdentifier(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_identifier_overflow_rejected() {
    // 2^256
    let too_big =
        "115792089237316195423570985008687907853269984665640564039457584007913129639936";
    assert!(matches!(
        parse_identifier(too_big),
        Err(Error::InvalidIdentifier(_))
    ));
}

// ============================================================================
// Derivation
// ============================================================================

#[test]
fn test_salt_is_identifier_big_endian() {
    let salt = resolver().salt_for("258").unwrap();
    let mut expected = [0u8; 32];
    expected[30] = 0x01;
    expected[31] = 0x02;
    assert_eq!(salt, B256::from(expected));
}

#[test]
fn test_resolution_is_stable() {
    let resolver = resolver();
    let first = resolver.resolve("42").unwrap();
    let second = resolver.resolve("42").unwrap();
    assert_eq!(first, second);
    assert_ne!(first, Address::ZERO);

    // Leading zeros name the same integer
    assert_eq!(resolver.resolve("0042").unwrap(), first);
}

#[test]
fn test_resolution_depends_on_factory_and_init_code() {
    let base = resolver().resolve("42").unwrap();

    let other_factory = AddressResolver::new(Address::repeat_byte(0x01), B256::repeat_byte(0x5c));
    let other_code = AddressResolver::new(resolver().factory(), B256::repeat_byte(0x5d));

    assert_ne!(other_factory.resolve("42").unwrap(), base);
    assert_ne!(other_code.resolve("42").unwrap(), base);
}

#[test]
fn test_checksummed_output() {
    let resolver = resolver();
    let checksummed = resolver.resolve_checksummed("42").unwrap();
    assert!(checksummed.starts_with("0x"));
    assert_eq!(checksummed.len(), 42);
    assert_eq!(
        checksummed.parse::<Address>().unwrap(),
        resolver.resolve("42").unwrap()
    );
    assert_eq!(checksummed, resolver.resolve("42").unwrap().to_checksum(None));
}

#[test]
fn test_invalid_identifier_does_not_resolve() {
    assert!(matches!(
        resolver().resolve("user-42"),
        Err(Error::InvalidIdentifier(_))
    ));
}
