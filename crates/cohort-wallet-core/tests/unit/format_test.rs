//! Unit tests for the bundler wire format

use alloy_primitives::{Address, U256};
use cohort_wallet_core::account::{AccountDeployment, Paymaster, encode_create_account};
use cohort_wallet_core::{BundlerFormatAdapter, OperationBuilder, UserOperation};
use serde_json::Value;

const FACTORY_KEYS: [&str; 2] = ["factory", "factoryData"];
const PAYMASTER_KEYS: [&str; 4] = [
    "paymaster",
    "paymasterVerificationGasLimit",
    "paymasterPostOpGasLimit",
    "paymasterData",
];

fn plain_operation() -> UserOperation {
    OperationBuilder::new(Address::repeat_byte(0x11), U256::from(7u8))
        .call(Address::repeat_byte(0xaa), U256::from(1_000u64), &[])
}

fn full_operation() -> UserOperation {
    OperationBuilder::new(Address::repeat_byte(0x11), U256::ZERO)
        .account_deployed(false)
        .deploy_with(
            AccountDeployment {
                factory: Address::repeat_byte(0xfa),
                owner: Address::repeat_byte(0x0e),
            },
            U256::from(42u64),
        )
        .call(Address::repeat_byte(0xaa), U256::from(1_000u64), &[])
        .with_paymaster(Paymaster {
            address: Address::repeat_byte(0xbb),
            verification_gas_limit: U256::from(100_000u64),
            post_op_gas_limit: U256::from(20_000u64),
            data: vec![0xde, 0xad],
        })
}

fn is_hex(value: &Value) -> bool {
    value
        .as_str()
        .map(|s| s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

#[test]
fn test_absent_optionals_are_explicit_nulls() {
    let rpc = BundlerFormatAdapter::to_rpc(&plain_operation(), &[0u8; 65]).unwrap();
    let json = serde_json::to_value(&rpc).unwrap();
    let object = json.as_object().unwrap();

    for key in FACTORY_KEYS.iter().chain(PAYMASTER_KEYS.iter()) {
        assert_eq!(object.get(*key), Some(&Value::Null), "{} must be present as null", key);
    }
    assert_eq!(object.len(), 15);
}

#[test]
fn test_present_optionals_are_hex() {
    let rpc = BundlerFormatAdapter::to_rpc(&full_operation(), &[0x1b; 130]).unwrap();
    let json = serde_json::to_value(&rpc).unwrap();

    for (key, value) in json.as_object().unwrap() {
        assert!(is_hex(value), "{} = {} is not 0x hex", key, value);
    }
    assert_eq!(json["paymasterData"], "0xdead");
    assert_eq!(json["paymasterVerificationGasLimit"], "0x186a0");
    assert_eq!(
        json["factoryData"],
        format!("0x{}", hex::encode(encode_create_account(Address::repeat_byte(0x0e), U256::from(42u64))))
    );
}

#[test]
fn test_field_names_are_camel_case() {
    let rpc = BundlerFormatAdapter::to_rpc(&plain_operation(), &[]).unwrap();
    let json = serde_json::to_value(&rpc).unwrap();
    for key in [
        "sender",
        "nonce",
        "callData",
        "callGasLimit",
        "verificationGasLimit",
        "preVerificationGas",
        "maxFeePerGas",
        "maxPriorityFeePerGas",
        "signature",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_quantities_have_no_padding() {
    let rpc = BundlerFormatAdapter::to_rpc(&plain_operation(), &[]).unwrap();
    assert_eq!(rpc.nonce, "0x7");

    let zero = OperationBuilder::new(Address::repeat_byte(0x11), U256::ZERO)
        .call(Address::repeat_byte(0xaa), U256::ZERO, &[]);
    assert_eq!(BundlerFormatAdapter::to_rpc(&zero, &[]).unwrap().nonce, "0x0");
}

#[test]
fn test_sender_is_checksummed() {
    let sender: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
    let op = OperationBuilder::new(sender, U256::ZERO).call(Address::repeat_byte(0xaa), U256::ZERO, &[]);
    let rpc = BundlerFormatAdapter::to_rpc(&op, &[]).unwrap();
    assert_eq!(rpc.sender, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
}

#[test]
fn test_signature_encoded_verbatim() {
    let signature: Vec<u8> = (0u8..130).collect();
    let rpc = BundlerFormatAdapter::to_rpc(&plain_operation(), &signature).unwrap();
    assert_eq!(rpc.signature, format!("0x{}", hex::encode(&signature)));
}
