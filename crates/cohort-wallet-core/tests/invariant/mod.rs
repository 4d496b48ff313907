//! Invariant tests module
//!
//! This module contains tests that verify critical invariants:
//! - Combined signature length
//! - Session key freshness
//! - Sender binding of signed operations

pub mod signing_invariant;
