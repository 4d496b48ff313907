//! Error types for threshold-signed smart account operations

use thiserror::Error;

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, signing or submitting an operation
#[derive(Debug, Error)]
pub enum Error {
    // ============ Configuration Errors ============
    /// Missing or malformed setting (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ============ Caller Input Errors ============
    /// Malformed counterparty or contract address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Stable user identifier is not a non-negative integer
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Malformed or non-positive transfer amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Smart account cannot cover the transfer
    #[error("Insufficient balance: {balance} < {required}")]
    InsufficientBalance { balance: String, required: String },

    // ============ Signing Network Errors ============
    /// Signing gateway unreachable, non-2xx, or reported errors
    #[error("Signing gateway error: {0}")]
    Gateway(String),

    /// Gateway returned an empty response map
    #[error("Signing gateway returned no responses")]
    EmptyResponse,

    /// Gateway produced no usable signature responses
    #[error("No signatures returned: {0}")]
    NoSignatures(String),

    /// Fewer valid partial signatures than the quorum requires
    #[error("Quorum not met: required {required}, got {actual}")]
    QuorumNotMet { required: usize, actual: usize },

    // ============ Relay Errors ============
    /// Bundler answered with a JSON-RPC error; the operation was not broadcast
    #[error("Bundler rejected operation: {0}")]
    BundlerRejection(String),

    /// Operation cannot be expressed in the bundler wire format
    #[error("Encoding error: {0}")]
    Encoding(String),

    // ============ Cryptographic Errors ============
    /// Key agreement or key material failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// AEAD encryption/decryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    // ============ Serialization Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ============ Chain Errors ============
    /// Transport failure talking to a JSON-RPC endpoint
    #[error("RPC error: {0}")]
    Rpc(String),

    /// JSON-RPC error object returned by a node
    #[error("RPC error {code}: {message}")]
    RpcResponse { code: i64, message: String },
}

impl Error {
    /// Whether the failure happened in transport rather than in the cohort or caller input.
    ///
    /// Nothing in this crate retries; callers use this to decide their own policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Gateway(_) | Error::EmptyResponse | Error::Rpc(_))
    }

    /// Whether the failure is attributable to the caller's request.
    ///
    /// Malformed input fails before any network call. An insufficient balance
    /// is found by the pre-flight balance read, before any signing or bundler
    /// traffic.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress(_)
                | Error::InvalidIdentifier(_)
                | Error::InvalidAmount(_)
                | Error::InsufficientBalance { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(e.to_string())
    }
}
