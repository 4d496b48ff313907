//! # Smart Wallet
//!
//! Drives a complete transfer from a smart account whose signer is a
//! threshold cohort:
//!
//! 1. Validate the request and resolve the sending account
//! 2. Pre-flight balance check
//! 3. Read the anti-replay counter and deployment state
//! 4. Build the operation and re-price its gas
//! 5. Run a signing round and aggregate the partial signatures
//! 6. Submit the signed operation to the bundler
//!
//! Every step that fails aborts the round. Nothing is retried.

use crate::account::{AccountDeployment, AddressResolver, OperationBuilder, SignedOperation, UserOperation};
use crate::bundler::{Bundler, BundlerFormatAdapter};
use crate::chain::ChainReader;
use crate::config::{ProtocolMode, WalletConfig};
use crate::gas::GasEstimationOptimizer;
use crate::signing::{
    LegacySigningClient, LegacySigningGateway, SignatureAggregator, SigningGateway, SigningParams,
    ThresholdSigningClient,
};
use crate::types::{SignerId, SigningContext, format_native_amount, parse_address, parse_native_amount};
use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A native-currency transfer on behalf of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Stable decimal user identifier, used as the account salt
    pub user_id: String,
    /// Recipient address (`0x` + 40 hex)
    pub recipient: String,
    /// Amount in native units, e.g. `"0.01"`
    pub amount: String,
}

impl TransferRequest {
    pub fn new(
        user_id: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }
}

/// Outcome of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub round_id: Uuid,
    pub smart_account: Address,
    pub recipient: Address,
    /// Amount in base units
    pub amount: U256,
    /// EntryPoint hash of the signed operation
    pub operation_hash: B256,
    /// Hash returned by the bundler
    pub bundler_hash: B256,
    /// Contributing signers, in signature order
    pub signers: Vec<SignerId>,
    pub submitted_at: DateTime<Utc>,
}

impl TransferReceipt {
    /// Amount in native units
    pub fn formatted_amount(&self) -> String {
        format_native_amount(self.amount, crate::types::NATIVE_DECIMALS)
    }
}

/// Threshold-signed smart account wallet
#[derive(Clone)]
pub struct SmartWallet {
    config: WalletConfig,
    chain: Arc<dyn ChainReader>,
    bundler: Arc<dyn Bundler>,
    gateway: Arc<dyn SigningGateway>,
    legacy_gateway: Option<Arc<dyn LegacySigningGateway>>,
}

impl SmartWallet {
    /// Assemble a wallet from its collaborators
    pub fn new(
        config: WalletConfig,
        chain: Arc<dyn ChainReader>,
        bundler: Arc<dyn Bundler>,
        gateway: Arc<dyn SigningGateway>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            chain,
            bundler,
            gateway,
            legacy_gateway: None,
        })
    }

    /// Gateway used when the configuration selects the plaintext protocol
    pub fn with_legacy_gateway(mut self, gateway: Arc<dyn LegacySigningGateway>) -> Self {
        self.legacy_gateway = Some(gateway);
        self
    }

    /// Connect to the configured chain node, bundler and signing gateway
    #[cfg(feature = "runtime")]
    pub fn connect(config: WalletConfig) -> Result<Self> {
        use crate::bundler::HttpBundler;
        use crate::chain::{RpcClient, evm::EvmReader};
        use crate::signing::PorterGateway;

        let timeout = config.request_timeout();
        let chain = EvmReader::new(RpcClient::new(&config.rpc_url, timeout)?, config.entry_point);
        let bundler = HttpBundler::new(
            RpcClient::new(&config.bundler_url, timeout)?,
            config.gas_price_method.clone(),
        );
        let gateway = Arc::new(PorterGateway::new(&config.gateway_url, timeout)?);

        info!(
            chain = %config.chain_id,
            bundler = %config.redacted_bundler_url(),
            gateway = %config.gateway_url,
            cohort_id = config.cohort_id,
            threshold = config.threshold,
            protocol = ?config.protocol,
            "Connecting smart wallet"
        );

        Ok(Self::new(config, Arc::new(chain), Arc::new(bundler), gateway.clone())?
            .with_legacy_gateway(gateway))
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Resolver for per-user accounts, when derivation is configured
    pub fn resolver(&self) -> Option<AddressResolver> {
        match (self.config.account_factory, self.config.init_code_hash) {
            (Some(factory), Some(init_code_hash)) => Some(AddressResolver::new(factory, init_code_hash)),
            _ => None,
        }
    }

    /// Smart account that sends on behalf of `user_id`.
    ///
    /// A pinned account in the configuration wins over derivation. The
    /// identifier is validated either way.
    pub fn smart_account_for(&self, user_id: &str) -> Result<Address> {
        crate::account::parse_identifier(user_id)?;
        if let Some(account) = self.config.smart_account {
            return Ok(account);
        }
        let resolver = self.resolver().ok_or_else(|| {
            Error::Configuration("no smart account pinned and no account factory configured".into())
        })?;
        resolver.resolve(user_id)
    }

    /// Run a full transfer round and submit the result to the bundler
    #[instrument(skip(self, request, context), fields(user_id = %request.user_id))]
    pub async fn send_native(
        &self,
        request: &TransferRequest,
        context: &SigningContext,
    ) -> Result<TransferReceipt> {
        // Caller input first: no network traffic for bad requests
        let recipient = parse_address(&request.recipient)?;
        let amount = parse_native_amount(&request.amount, crate::types::NATIVE_DECIMALS)?;
        let salt = crate::account::parse_identifier(&request.user_id)?;
        let sender = self.smart_account_for(&request.user_id)?;

        let balance = self.chain.balance(sender).await?;
        if !balance.covers(amount) {
            return Err(Error::InsufficientBalance {
                balance: balance.formatted,
                required: format_native_amount(amount, crate::types::NATIVE_DECIMALS),
            });
        }

        let nonce = self.chain.account_nonce(sender).await?;
        let deployed = self.chain.is_deployed(sender).await?;

        let mut builder = OperationBuilder::new(sender, nonce).account_deployed(deployed);
        // createAccount deploys the derived address, so a pinned sender never carries it
        if self.config.smart_account.is_none() {
            if let (Some(factory), Some(owner)) =
                (self.config.account_factory, self.config.account_owner)
            {
                builder = builder.deploy_with(AccountDeployment { factory, owner }, salt);
            }
        }
        let mut operation = builder.call(recipient, amount, &[]);

        info!(
            %sender,
            %recipient,
            amount = %request.amount,
            %nonce,
            deployed,
            "Built transfer operation"
        );

        GasEstimationOptimizer::new(self.bundler.clone(), self.config.entry_point, self.config.threshold)
            .optimize(&mut operation)
            .await?;

        let (round_id, signed) = self.sign_round(operation, context).await?;

        let rpc_operation = BundlerFormatAdapter::to_rpc_signed(&signed)?;
        let bundler_hash = self.bundler.send(&rpc_operation, self.config.entry_point).await?;

        info!(
            %round_id,
            operation_hash = %signed.hash(),
            %bundler_hash,
            "Transfer submitted"
        );

        Ok(TransferReceipt {
            round_id,
            smart_account: sender,
            recipient,
            amount,
            operation_hash: signed.hash(),
            bundler_hash,
            signers: signed.signature().signers().to_vec(),
            submitted_at: Utc::now(),
        })
    }

    /// Run only the signing round for an already priced operation
    pub async fn sign_operation(
        &self,
        operation: UserOperation,
        context: &SigningContext,
    ) -> Result<SignedOperation> {
        self.sign_round(operation, context)
            .await
            .map(|(_, signed)| signed)
    }

    async fn sign_round(
        &self,
        operation: UserOperation,
        context: &SigningContext,
    ) -> Result<(Uuid, SignedOperation)> {
        let params = SigningParams::from_config(&self.config);

        match self.config.protocol {
            ProtocolMode::Encrypted => {
                let operation_hash = operation.hash(params.entry_point, params.chain_id)?;
                let aggregator = SignatureAggregator::new(params.threshold)?;
                let round = ThresholdSigningClient::new(self.gateway.clone(), params)
                    .request_signatures(&operation, context)
                    .await?;
                let round_id = round.round_id;
                let signed = aggregator.aggregate(operation, operation_hash, round)?;
                Ok((round_id, signed))
            }
            ProtocolMode::LegacyPlaintext => {
                let gateway = self.legacy_gateway.clone().ok_or_else(|| {
                    Error::Configuration("plaintext protocol selected but no legacy gateway set".into())
                })?;
                let signed = LegacySigningClient::new(gateway, params, self.config.cohort_size)
                    .sign(operation, context)
                    .await?;
                Ok((Uuid::new_v4(), signed))
            }
        }
    }
}

impl std::fmt::Debug for SmartWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartWallet")
            .field("chain_id", &self.config.chain_id)
            .field("cohort_id", &self.config.cohort_id)
            .field("threshold", &self.config.threshold)
            .field("protocol", &self.config.protocol)
            .field("legacy_gateway", &self.legacy_gateway.is_some())
            .finish()
    }
}
