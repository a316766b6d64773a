pub mod alloy;
pub mod contract;
pub mod error;
pub mod logs;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

use std::pin::Pin;

use ::alloy::primitives::{Address, B256, Signature, U256};
use ::alloy::rpc::types::{Filter, Log};
pub use alloy::{AlloyLaunchpadRepository, parse_signer};
use async_trait::async_trait;
pub use error::RepositoryError;
use futures::Stream;
pub use logs::AlloyLogSource;
pub use types::{
    BuyCall, CurveState, Quote, SellCall, SellPermitCall, TokenMetadata, TradeCall, TxOutcome,
};

pub(crate) type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// A live feed of log batches. The feed ending, or yielding an error, means the
/// underlying watch is gone.
pub type LogStream = Pin<Box<dyn Stream<Item = RepoResult<Vec<Log>>> + Send>>;

/// Trait for the launchpad's point reads, writes and gas estimation.
///
/// Every method maps onto one contract call (or a call plus its receipt). No
/// method retries; failures surface as-is so the caller decides remediation.
#[async_trait]
pub trait LaunchpadRepository: Send + Sync {
    /// Address of the configured signer, `None` in read-only mode.
    fn wallet_address(&self) -> Option<Address>;

    /// Quotes the output of an exact-input trade through the lens.
    ///
    /// # Arguments
    ///
    /// * `token` - The launchpad token being bought or sold
    /// * `amount_in` - Native amount for buys, token amount for sells
    /// * `is_buy` - Direction of the trade
    ///
    /// # Returns
    ///
    /// * `Ok(Quote)` - The router that will execute the trade and the output amount
    /// * `Err(RepositoryError)` - If the lens call reverts or the RPC call fails
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let quote = repository.get_amount_out(token, parse_ether("1")?, true).await?;
    /// println!("{} tokens via {}", quote.amount, quote.router);
    /// ```
    async fn get_amount_out(
        &self,
        token: Address,
        amount_in: U256,
        is_buy: bool,
    ) -> RepoResult<Quote>;

    /// Quotes the input required for an exact-output trade through the lens.
    async fn get_amount_in(
        &self,
        token: Address,
        amount_out: U256,
        is_buy: bool,
    ) -> RepoResult<Quote>;

    /// Bonding progress of `token` in basis points.
    async fn get_progress(&self, token: Address) -> RepoResult<U256>;

    async fn is_graduated(&self, token: Address) -> RepoResult<bool>;

    async fn is_locked(&self, token: Address) -> RepoResult<bool>;

    /// Tokens still purchasable on the curve and the native amount required for them.
    async fn available_buy_tokens(&self, token: Address) -> RepoResult<(U256, U256)>;

    async fn curve_state(&self, token: Address) -> RepoResult<CurveState>;

    /// Sends a router call signed by the configured wallet and waits for its receipt.
    ///
    /// # Returns
    ///
    /// * `Ok(TxOutcome)` - Hash, status and gas of the mined transaction
    /// * `Err(RepositoryError::MissingSigner)` - If no signing key is configured
    /// * `Err(RepositoryError::ContractError)` - If sending or mining fails
    async fn execute_trade(&self, router: Address, call: &TradeCall) -> RepoResult<TxOutcome>;

    /// Estimates gas for a router call sent from `from`.
    async fn estimate_trade_gas(
        &self,
        router: Address,
        call: &TradeCall,
        from: Address,
    ) -> RepoResult<u64>;

    async fn native_balance(&self, owner: Address) -> RepoResult<U256>;

    /// Name, symbol, decimals and total supply of an ERC20 token.
    async fn token_metadata(&self, token: Address) -> RepoResult<TokenMetadata>;

    async fn balance_of(&self, token: Address, owner: Address) -> RepoResult<U256>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> RepoResult<U256>;

    /// Current EIP-2612 nonce of `owner` on `token`.
    async fn nonces(&self, token: Address, owner: Address) -> RepoResult<U256>;

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> RepoResult<TxOutcome>;

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> RepoResult<TxOutcome>;

    /// DEX pool for a pair and fee tier, `None` when the factory has none.
    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> RepoResult<Option<Address>>;

    /// Signs a 32-byte digest with the configured wallet.
    async fn sign_hash(&self, hash: B256) -> RepoResult<Signature>;
}

/// Trait for the log-query primitives the indexers and streams consume.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head.
    async fn block_number(&self) -> RepoResult<u64>;

    /// Historical logs matching `filter` (`eth_getLogs`).
    async fn get_logs(&self, filter: &Filter) -> RepoResult<Vec<Log>>;

    /// Opens a live watch for logs matching `filter`.
    ///
    /// Only the address and topic parts of `filter` apply; the watch starts at
    /// the current head.
    async fn watch_logs(&self, filter: &Filter) -> RepoResult<LogStream>;
}
