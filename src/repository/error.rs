use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract call error: {0}")]
    ContractError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Block range rejected by node: {0}")]
    RangeTooLarge(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No signing key configured for {0}")]
    MissingSigner(String),

    #[error("{0}")]
    Other(String),
}

impl RepositoryError {
    /// Classifies a transport-level failure from its message.
    ///
    /// Nodes report rate limits and oversized `eth_getLogs` ranges as plain
    /// JSON-RPC errors, so the text is all there is to go on.
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
        {
            RepositoryError::RateLimited(message)
        } else if lower.contains("block range")
            || lower.contains("range is too large")
            || lower.contains("query returned more than")
            || lower.contains("too many results")
            || lower.contains("log response size exceeded")
        {
            RepositoryError::RangeTooLarge(message)
        } else if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection")
            || lower.contains("backend gone")
        {
            RepositoryError::NetworkError(message)
        } else {
            RepositoryError::RpcError(message)
        }
    }

    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::RpcError(_)
                | RepositoryError::NetworkError(_)
                | RepositoryError::RateLimited(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_classified() {
        let err = RepositoryError::from_transport("HTTP error 429 with body: Too Many Requests");
        assert!(matches!(err, RepositoryError::RateLimited(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_oversized_range_is_not_transient() {
        let err = RepositoryError::from_transport(
            "server returned an error response: error code -32005: query returned more than 10000 results",
        );
        assert!(matches!(err, RepositoryError::RangeTooLarge(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_timeout_is_network_error() {
        let err = RepositoryError::from_transport("request timed out");
        assert!(matches!(err, RepositoryError::NetworkError(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_contract_errors_are_not_transient() {
        assert!(!RepositoryError::ContractError("execution reverted".into()).is_transient());
        assert!(!RepositoryError::MissingSigner("buy".into()).is_transient());
    }
}
