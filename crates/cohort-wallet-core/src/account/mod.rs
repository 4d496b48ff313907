//! # Smart Accounts
//!
//! ERC-4337 account-abstraction pieces that do not touch the network:
//! - UserOperation construction and EntryPoint v0.7 hashing
//! - Counterfactual (CREATE2) account addresses
//! - The signed operation produced by a signing round
//!
//! ## Example
//!
//! ```rust,ignore
//! use cohort_wallet_core::account::{AddressResolver, OperationBuilder};
//!
//! let resolver = AddressResolver::new(factory, init_code_hash);
//! let sender = resolver.resolve("42")?;
//!
//! let operation = OperationBuilder::new(sender, nonce)
//!     .account_deployed(false)
//!     .deploy_with(deployment, parse_identifier("42")?)
//!     .transfer("0xAAAA...", amount)?;
//! ```

pub mod address;
pub mod builder;
pub mod operation;

pub use crate::config::ENTRY_POINT_V07;
pub use address::{AddressResolver, parse_identifier};
pub use builder::{AccountDeployment, OperationBuilder, encode_create_account, encode_execute};
pub use operation::{CombinedSignature, GasLimits, Paymaster, SignedOperation, UserOperation};
