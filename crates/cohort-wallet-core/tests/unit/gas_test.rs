//! Unit tests for gas re-pricing against a scripted bundler

use alloy_primitives::{Address, U256};
use cohort_wallet_core::bundler::{GasEstimate, GasPrice, GasPriceTiers, MemoryBundler};
use cohort_wallet_core::types::SIGNATURE_LENGTH;
use cohort_wallet_core::{ENTRY_POINT_V07, GasEstimationOptimizer, GasLimits, OperationBuilder, UserOperation};
use serde_json::json;
use std::sync::Arc;

fn operation() -> UserOperation {
    OperationBuilder::new(Address::repeat_byte(0x11), U256::from(3u8))
        .transfer("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", U256::from(10u64).pow(U256::from(16u64)))
        .unwrap()
}

fn optimizer(bundler: &MemoryBundler, threshold: usize) -> GasEstimationOptimizer {
    GasEstimationOptimizer::new(Arc::new(bundler.clone()), ENTRY_POINT_V07, threshold)
}

#[tokio::test]
async fn test_verification_gas_gets_fifty_percent_margin() {
    let bundler = MemoryBundler::new();
    bundler.set_estimate(GasEstimate {
        pre_verification_gas: Some(json!("0xc350")),
        verification_gas_limit: Some(json!("0x186a0")),
        call_gas_limit: Some(json!("0x5208")),
    });

    let mut op = operation();
    optimizer(&bundler, 2).optimize(&mut op).await.unwrap();

    assert_eq!(op.verification_gas_limit(), U256::from(150_000u64));
    assert_eq!(op.call_gas_limit(), U256::from(21_000u64));
    assert_eq!(op.pre_verification_gas(), U256::from(50_000u64));
}

#[tokio::test]
async fn test_fast_tier_fees_applied() {
    let bundler = MemoryBundler::new();
    bundler.set_gas_price(GasPriceTiers {
        slow: Some(GasPrice {
            max_fee_per_gas: Some(json!("0x1")),
            max_priority_fee_per_gas: Some(json!("0x1")),
        }),
        standard: Some(GasPrice {
            max_fee_per_gas: Some(json!("0x2")),
            max_priority_fee_per_gas: Some(json!("0x2")),
        }),
        fast: Some(GasPrice {
            max_fee_per_gas: Some(json!("0x3b9aca00")),
            max_priority_fee_per_gas: Some(json!("0x5f5e100")),
        }),
    });

    let mut op = operation();
    optimizer(&bundler, 2).optimize(&mut op).await.unwrap();

    assert_eq!(op.max_fee_per_gas(), U256::from(1_000_000_000u64));
    assert_eq!(op.max_priority_fee_per_gas(), U256::from(100_000_000u64));
}

#[tokio::test]
async fn test_missing_fields_leave_prior_values() {
    let bundler = MemoryBundler::new();
    bundler.set_estimate(GasEstimate {
        pre_verification_gas: None,
        verification_gas_limit: Some(json!("0x186a0")),
        call_gas_limit: None,
    });

    let mut op = operation();
    optimizer(&bundler, 2).optimize(&mut op).await.unwrap();

    let defaults = GasLimits::default();
    assert_eq!(op.call_gas_limit(), defaults.call_gas_limit);
    assert_eq!(op.pre_verification_gas(), defaults.pre_verification_gas);
    assert_eq!(op.max_fee_per_gas(), defaults.max_fee_per_gas);
    assert_eq!(op.max_priority_fee_per_gas(), defaults.max_priority_fee_per_gas);
    assert_eq!(op.verification_gas_limit(), U256::from(150_000u64));
}

#[tokio::test]
async fn test_estimate_uses_placeholder_of_final_length() {
    let bundler = MemoryBundler::new();
    let mut op = operation();
    optimizer(&bundler, 3).optimize(&mut op).await.unwrap();

    let estimated = bundler.estimated();
    assert_eq!(estimated.len(), 1);
    let signature = &estimated[0].signature;
    assert_eq!(signature.len(), 2 + 2 * 3 * SIGNATURE_LENGTH);
    assert!(signature[2..].chars().all(|c| c == '0'));

    // Estimation is not submission
    assert_eq!(bundler.sent_count(), 0);
}

#[tokio::test]
async fn test_estimate_sees_fast_fees() {
    let bundler = MemoryBundler::new();
    bundler.set_gas_price(GasPriceTiers {
        fast: Some(GasPrice {
            max_fee_per_gas: Some(json!("0x77")),
            max_priority_fee_per_gas: Some(json!("0x7")),
        }),
        ..Default::default()
    });

    let mut op = operation();
    optimizer(&bundler, 2).optimize(&mut op).await.unwrap();

    let estimated = bundler.estimated();
    assert_eq!(estimated[0].max_fee_per_gas, "0x77");
    assert_eq!(estimated[0].max_priority_fee_per_gas, "0x7");
}
