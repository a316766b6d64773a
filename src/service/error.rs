use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ServiceError {
    // Caller errors
    /// A capability was requested that the configuration does not support
    /// (e.g. a websocket stream without a websocket URL).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provided address is invalid or malformed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The requested amount is invalid (e.g., zero, out of range, or malformed).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Any other argument outside its valid domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A write was requested in read-only mode.
    #[error("No signing key configured for {0}")]
    MissingSigner(String),

    /// The slippage tolerance is outside `[0, 100)`.
    #[error("Slippage tolerance must be at least 0% and below 100%: {0}")]
    SlippageExceeded(String),

    /// The wallet holds less than the operation needs.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    // Infrastructure errors (abstracted from repository layer)
    /// RPC timeout, dropped connection or rate limit. Retrying later can succeed.
    #[error("Transient transport error: {0}")]
    TransientTransport(String),

    /// The node rejected a log query range; narrow it and retry.
    #[error("Block range too large: {0}")]
    RangeTooLarge(String),

    /// A contract call reverted or a transaction failed.
    #[error("Chain call failed: {0}")]
    ChainCall(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::TransientTransport(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::RpcError(msg)
            | RepositoryError::NetworkError(msg)
            | RepositoryError::RateLimited(msg) => ServiceError::TransientTransport(msg),
            RepositoryError::RangeTooLarge(msg) => ServiceError::RangeTooLarge(msg),
            RepositoryError::ContractError(msg) => {
                ServiceError::ChainCall(format!("Failed to interact with launchpad: {msg}"))
            }
            RepositoryError::ParseError(msg) => ServiceError::InvalidArgument(msg),
            RepositoryError::MissingSigner(msg) => ServiceError::MissingSigner(msg),
            RepositoryError::Other(msg) => ServiceError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        let err: ServiceError = RepositoryError::RateLimited("429".into()).into();
        assert!(err.is_retryable());

        let err: ServiceError = RepositoryError::NetworkError("timed out".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_chain_call_errors_are_not_retryable() {
        let err: ServiceError = RepositoryError::ContractError("execution reverted".into()).into();
        assert!(matches!(err, ServiceError::ChainCall(_)));
        assert!(!err.is_retryable());

        let err: ServiceError = RepositoryError::RangeTooLarge("10000 results".into()).into();
        assert!(matches!(err, ServiceError::RangeTooLarge(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_signer_is_preserved() {
        let err: ServiceError = RepositoryError::MissingSigner("buy".into()).into();
        assert_eq!(err, ServiceError::MissingSigner("buy".into()));
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(ServiceError::InvalidAmount("zero".into())).unwrap();
        assert_eq!(json["type"], "InvalidAmount");
        assert_eq!(json["message"], "zero");
    }
}
