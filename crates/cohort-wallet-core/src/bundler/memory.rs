//! In-memory bundler for testing and local development

use super::{Bundler, GasEstimate, GasPriceTiers, RpcUserOperation};
use crate::types::keccak256_hash;
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct State {
    tiers: GasPriceTiers,
    estimate: GasEstimate,
    rejection: Option<String>,
    estimated: Vec<RpcUserOperation>,
    sent: Vec<(RpcUserOperation, Address)>,
}

/// Scripted gas oracle that records every operation it receives
#[derive(Debug, Clone, Default)]
pub struct MemoryBundler {
    state: Arc<Mutex<State>>,
}

impl MemoryBundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fee tiers returned by `gas_price`
    pub fn set_gas_price(&self, tiers: GasPriceTiers) {
        self.state.lock().tiers = tiers;
    }

    /// Estimate returned by `estimate_gas`
    pub fn set_estimate(&self, estimate: GasEstimate) {
        self.state.lock().estimate = estimate;
    }

    /// Reject every submission with `message`
    pub fn reject_with(&self, message: impl Into<String>) {
        self.state.lock().rejection = Some(message.into());
    }

    /// Operations submitted for estimation
    pub fn estimated(&self) -> Vec<RpcUserOperation> {
        self.state.lock().estimated.clone()
    }

    /// Operations accepted for broadcast
    pub fn sent(&self) -> Vec<RpcUserOperation> {
        self.state.lock().sent.iter().map(|(op, _)| op.clone()).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }
}

#[async_trait]
impl Bundler for MemoryBundler {
    async fn gas_price(&self) -> Result<GasPriceTiers> {
        Ok(self.state.lock().tiers.clone())
    }

    async fn estimate_gas(
        &self,
        operation: &RpcUserOperation,
        _entry_point: Address,
    ) -> Result<GasEstimate> {
        let mut state = self.state.lock();
        state.estimated.push(operation.clone());
        Ok(state.estimate.clone())
    }

    async fn send(&self, operation: &RpcUserOperation, entry_point: Address) -> Result<B256> {
        let mut state = self.state.lock();
        if let Some(message) = &state.rejection {
            return Err(Error::BundlerRejection(message.clone()));
        }
        let hash = B256::from(keccak256_hash(&serde_json::to_vec(operation)?));
        state.sent.push((operation.clone(), entry_point));
        Ok(hash)
    }
}
