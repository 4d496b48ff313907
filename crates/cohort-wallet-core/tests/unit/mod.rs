//! Unit tests module
//!
//! This module contains unit tests for individual components:
//! - Account derivation
//! - Session key exchange
//! - Signature aggregation
//! - Gas optimization and bundler format

pub mod address_test;
pub mod aggregator_test;
pub mod format_test;
pub mod gas_test;
