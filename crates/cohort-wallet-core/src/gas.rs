//! Gas re-pricing before signing
//!
//! Two bundler reads: the fee tiers, then a gas estimate for the operation
//! carrying an all-zero placeholder signature of the final combined length.
//! A missing tier or field leaves the operation's previous value in place.

use crate::account::UserOperation;
use crate::bundler::{Bundler, BundlerFormatAdapter, GasEstimate, GasPriceTiers};
use crate::chain::parse_hex_u256;
use crate::Result;
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Extra verification gas, in percent of the estimate, for checking a
/// concatenated multi-party signature
pub const VERIFICATION_GAS_MARGIN_PERCENT: u64 = 50;

/// Re-prices operations from bundler oracles
#[derive(Clone)]
pub struct GasEstimationOptimizer {
    bundler: Arc<dyn Bundler>,
    entry_point: Address,
    threshold: usize,
}

impl GasEstimationOptimizer {
    pub fn new(bundler: Arc<dyn Bundler>, entry_point: Address, threshold: usize) -> Self {
        Self {
            bundler,
            entry_point,
            threshold,
        }
    }

    /// Apply fast-tier fees and estimated limits to `operation` in place
    #[instrument(skip(self, operation), fields(sender = %operation.sender()))]
    pub async fn optimize(&self, operation: &mut UserOperation) -> Result<()> {
        let tiers = self.bundler.gas_price().await?;
        apply_fee_tiers(operation, &tiers);

        let placeholder = BundlerFormatAdapter::to_rpc_placeholder(operation, self.threshold)?;
        let estimate = self
            .bundler
            .estimate_gas(&placeholder, self.entry_point)
            .await?;
        apply_estimate(operation, &estimate);

        debug!(
            call_gas_limit = %operation.call_gas_limit(),
            verification_gas_limit = %operation.verification_gas_limit(),
            pre_verification_gas = %operation.pre_verification_gas(),
            max_fee_per_gas = %operation.max_fee_per_gas(),
            max_priority_fee_per_gas = %operation.max_priority_fee_per_gas(),
            "Re-priced operation"
        );
        Ok(())
    }
}

impl std::fmt::Debug for GasEstimationOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GasEstimationOptimizer")
            .field("entry_point", &self.entry_point)
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// Apply the `fast` tier's fee caps
pub fn apply_fee_tiers(operation: &mut UserOperation, tiers: &GasPriceTiers) {
    let Some(fast) = &tiers.fast else {
        warn!("Gas price response has no fast tier; keeping current fees");
        return;
    };

    if let Some(value) = quantity_field("maxFeePerGas", fast.max_fee_per_gas.as_ref()) {
        operation.set_max_fee_per_gas(value);
    }
    if let Some(value) = quantity_field(
        "maxPriorityFeePerGas",
        fast.max_priority_fee_per_gas.as_ref(),
    ) {
        operation.set_max_priority_fee_per_gas(value);
    }
}

/// Apply an estimate: call and pre-verification gas as-is, verification
/// gas with the safety margin
pub fn apply_estimate(operation: &mut UserOperation, estimate: &GasEstimate) {
    if let Some(value) = quantity_field("callGasLimit", estimate.call_gas_limit.as_ref()) {
        operation.set_call_gas_limit(value);
    }
    if let Some(value) = quantity_field(
        "preVerificationGas",
        estimate.pre_verification_gas.as_ref(),
    ) {
        operation.set_pre_verification_gas(value);
    }
    if let Some(value) = quantity_field(
        "verificationGasLimit",
        estimate.verification_gas_limit.as_ref(),
    ) {
        operation.set_verification_gas_limit(with_verification_margin(value));
    }
}

/// `value * 1.5`, in integer arithmetic, saturating at `U256::MAX`
pub fn with_verification_margin(value: U256) -> U256 {
    let percent = U256::from(VERIFICATION_GAS_MARGIN_PERCENT);
    let hundred = U256::from(100u64);
    // floor(v * p / 100) without forming v * p
    let margin = (value / hundred) * percent + (value % hundred) * percent / hundred;
    value.saturating_add(margin)
}

/// Read a hex-string or numeric quantity; unusable values are skipped
fn quantity_field(name: &str, value: Option<&serde_json::Value>) -> Option<U256> {
    match value? {
        serde_json::Value::String(s) => match parse_hex_u256(s) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(field = name, value = %s, error = %e, "Ignoring unparseable gas field");
                None
            }
        },
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(v) => Some(U256::from(v)),
            None => {
                warn!(field = name, value = %n, "Ignoring non-integer gas field");
                None
            }
        },
        serde_json::Value::Null => None,
        other => {
            warn!(field = name, value = %other, "Ignoring unexpected gas field");
            None
        }
    }
}
