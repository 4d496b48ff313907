//! In-memory chain state for testing and local development

use super::{Balance, ChainReader};
use crate::Result;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory chain holding balances, EntryPoint nonces and deployed code.
///
/// Unknown accounts read as zero balance, nonce zero and not deployed.
#[derive(Debug, Clone, Default)]
pub struct MemoryChain {
    balances: Arc<DashMap<Address, U256>>,
    nonces: Arc<DashMap<Address, U256>>,
    deployed: Arc<DashSet<Address>>,
    reads: Arc<AtomicUsize>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the native balance of an account
    pub fn set_balance(&self, address: Address, wei: U256) {
        self.balances.insert(address, wei);
    }

    /// Set the EntryPoint nonce of an account
    pub fn set_nonce(&self, address: Address, nonce: U256) {
        self.nonces.insert(address, nonce);
    }

    /// Mark an account as having deployed code
    pub fn deploy(&self, address: Address) {
        self.deployed.insert(address);
    }

    /// Number of reads served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for MemoryChain {
    async fn balance(&self, address: Address) -> Result<Balance> {
        self.record_read();
        let raw = self.balances.get(&address).map(|b| *b).unwrap_or_default();
        Ok(Balance::native(raw))
    }

    async fn account_nonce(&self, sender: Address) -> Result<U256> {
        self.record_read();
        Ok(self.nonces.get(&sender).map(|n| *n).unwrap_or_default())
    }

    async fn is_deployed(&self, address: Address) -> Result<bool> {
        self.record_read();
        Ok(self.deployed.contains(&address))
    }
}
