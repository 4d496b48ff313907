//! Fuzz tests for account address derivation
//!
//! Property-based testing of the CREATE2 resolver over random identifiers.

use alloy_primitives::{Address, B256, U256};
use cohort_wallet_core::account::{AddressResolver, parse_identifier};
use proptest::prelude::*;

// ============================================================================
// Strategies for generating test data
// ============================================================================

fn resolver_strategy() -> impl Strategy<Value = AddressResolver> {
    (any::<[u8; 20]>(), any::<[u8; 32]>())
        .prop_map(|(factory, code)| AddressResolver::new(Address::from(factory), B256::from(code)))
}

/// Decimal identifiers of any length up to 77 digits (U256 fits 78)
fn identifier_strategy() -> impl Strategy<Value = String> {
    "[0-9]{1,77}"
}

// ============================================================================
// Derivation Properties
// ============================================================================

proptest! {
    /// Same identifier, same address
    #[test]
    fn resolution_is_deterministic(resolver in resolver_strategy(), id in identifier_strategy()) {
        let first = resolver.resolve(&id).unwrap();
        let second = resolver.resolve(&id).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Different integers, different addresses
    #[test]
    fn distinct_identifiers_yield_distinct_addresses(
        resolver in resolver_strategy(),
        a in any::<u64>(),
        b in any::<u64>(),
    ) {
        prop_assume!(a != b);
        let first = resolver.resolve(&a.to_string()).unwrap();
        let second = resolver.resolve(&b.to_string()).unwrap();
        prop_assert_ne!(first, second);
    }

    /// The salt is the identifier as a 32-byte big-endian integer
    #[test]
    fn salt_matches_integer(resolver in resolver_strategy(), id in any::<u128>()) {
        let salt = resolver.salt_for(&id.to_string()).unwrap();
        prop_assert_eq!(U256::from_be_bytes(salt.0), U256::from(id));
    }

    /// Anything with a non-digit is rejected, never resolved
    #[test]
    fn non_decimal_identifiers_rejected(id in "[0-9]{0,5}[^0-9][0-9a-z]{0,5}") {
        prop_assert!(parse_identifier(&id).is_err());
    }

    /// Checksummed form parses back to the same address
    #[test]
    fn checksummed_roundtrip(resolver in resolver_strategy(), id in any::<u64>()) {
        let id = id.to_string();
        let checksummed = resolver.resolve_checksummed(&id).unwrap();
        prop_assert_eq!(checksummed.parse::<Address>().unwrap(), resolver.resolve(&id).unwrap());
    }
}
