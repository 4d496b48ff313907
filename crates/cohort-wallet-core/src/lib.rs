//! # Cohort Wallet Core
//!
//! Core library for ERC-4337 smart accounts whose signer is an external
//! threshold cohort rather than a locally held key.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Operation Builder**: EntryPoint v0.7 operations with `execute` calldata
//!   and optional `createAccount` deployment payloads
//! - **Address Resolver**: CREATE2 derivation of per-user smart accounts
//! - **Session Key Exchange**: per-round X25519 keys and per-member secrets
//! - **Threshold Signing Client**: encrypted batched requests to the signing gateway
//! - **Signature Aggregator**: decryption, quorum, ordering and concatenation
//! - **Gas Optimizer**: bundler fee tiers and estimates applied before signing
//! - **Bundler Format Adapter**: the relay's JSON-RPC operation schema
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cohort_wallet_core::{SigningContext, SmartWallet, TransferRequest, WalletConfig};
//!
//! let config = WalletConfig::from_env()?;
//! let wallet = SmartWallet::connect(config)?;
//!
//! let request = TransferRequest::new("42", "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "0.01");
//! let context = SigningContext::new().with(":requester", "42");
//!
//! let receipt = wallet.send_native(&request, &context).await?;
//! println!("submitted {}", receipt.bundler_hash);
//! ```
//!
//! ## Security Model
//!
//! - Every signing round uses a fresh session key pair that cannot be reused
//! - Requests and responses are sealed per member; the gateway sees ciphertext only
//! - A combined signature is only emitted once `threshold` consistent
//!   partial signatures have been collected
//!
//! Request context travels as an explicit [`SigningContext`] argument.

pub mod account;
pub mod bundler;
pub mod chain;
pub mod config;
pub mod error;
pub mod gas;
pub mod signing;
pub mod types;
pub mod wallet;

pub use account::{
    AddressResolver, CombinedSignature, GasLimits, OperationBuilder, SignedOperation,
    UserOperation,
};
pub use bundler::{Bundler, BundlerFormatAdapter, RpcUserOperation};
pub use chain::{Balance, ChainId, ChainReader};
pub use config::{AaVersion, ENTRY_POINT_V07, ProtocolMode, WalletConfig};
pub use error::{Error, Result};
pub use gas::GasEstimationOptimizer;
pub use signing::{
    SessionKeyPair, SignatureAggregator, SigningCohort, SigningGateway, ThresholdSigningClient,
};
pub use types::{SIGNATURE_LENGTH, SignerId, SigningContext, keccak256_hash};
pub use wallet::{SmartWallet, TransferReceipt, TransferRequest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default quorum: signatures required from the cohort
pub const DEFAULT_THRESHOLD: usize = 2;
