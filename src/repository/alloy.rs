use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, B256, Signature, U256, aliases::U24};
use alloy::providers::{PendingTransactionError, Provider};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use tracing::instrument;

use super::error::RepositoryError;
use crate::config::ContractAddresses;
use crate::repository::contract::{IBondingCurve, IERC20, ILens, IRouter, IUniswapV3Factory};
use crate::repository::types::{CurveState, Quote, TokenMetadata, TradeCall, TxOutcome};
use crate::repository::{LaunchpadRepository, RepoResult};

/// Parses a hex private key into a local signer.
pub fn parse_signer(private_key: &str) -> RepoResult<PrivateKeySigner> {
    PrivateKeySigner::from_str(private_key.trim())
        .map_err(|e| RepositoryError::ParseError(format!("Invalid private key: {e}")))
}

fn contract_error(context: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::ContractError(format!("{context}: {e}"))
}

/// Classifies an RPC failure under a contract call or transaction.
///
/// A JSON-RPC error response is the node rejecting the request (revert,
/// bad nonce, insufficient funds) unless it reports a rate limit; anything
/// that never produced a response is a network failure.
fn rpc_error(context: &str, e: TransportError) -> RepositoryError {
    let message = format!("{context}: {e}");
    match RepositoryError::from_transport(message.as_str()) {
        err @ RepositoryError::RateLimited(_) => err,
        _ if matches!(e, RpcError::ErrorResp(_)) => RepositoryError::ContractError(message),
        _ => RepositoryError::NetworkError(message),
    }
}

fn call_error(context: &str, e: alloy::contract::Error) -> RepositoryError {
    match e {
        alloy::contract::Error::TransportError(e) => rpc_error(context, e),
        other => contract_error(context, other),
    }
}

fn confirm_error(context: &str, e: PendingTransactionError) -> RepositoryError {
    match e {
        PendingTransactionError::TransportError(e) => rpc_error(context, e),
        other => contract_error(context, other),
    }
}

fn outcome(receipt: TransactionReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: receipt.transaction_hash,
        success: receipt.status(),
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
    }
}

/// Launchpad gateway over an alloy provider.
///
/// Writes go through the provider's wallet filler, so a provider built with
/// `ProviderBuilder::wallet` must accompany a signer passed to
/// [`AlloyLaunchpadRepository::new_with_signer`].
pub struct AlloyLaunchpadRepository<P> {
    provider: Arc<P>,
    signer: Option<PrivateKeySigner>,
    contracts: ContractAddresses,
}

impl<P: Provider + Clone + 'static> AlloyLaunchpadRepository<P> {
    pub fn new(provider: Arc<P>, contracts: ContractAddresses) -> Self {
        Self {
            provider,
            signer: None,
            contracts,
        }
    }

    pub fn new_with_signer(
        provider: Arc<P>,
        signer: PrivateKeySigner,
        contracts: ContractAddresses,
    ) -> Self {
        Self {
            provider,
            signer: Some(signer),
            contracts,
        }
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    fn require_signer(&self, action: &str) -> RepoResult<&PrivateKeySigner> {
        self.signer
            .as_ref()
            .ok_or_else(|| RepositoryError::MissingSigner(action.to_string()))
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> LaunchpadRepository
    for AlloyLaunchpadRepository<P>
{
    fn wallet_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    #[instrument(skip(self), err)]
    async fn get_amount_out(
        &self,
        token: Address,
        amount_in: U256,
        is_buy: bool,
    ) -> RepoResult<Quote> {
        let lens = ILens::new(self.contracts.lens, self.provider.clone());

        let result = lens
            .getAmountOut(token, amount_in, is_buy)
            .call()
            .await
            .map_err(|e| call_error("Failed to get amount out", e))?;

        tracing::debug!(
            "Quote out for {}: {} -> {} via {}",
            token,
            amount_in,
            result.amountOut,
            result.router
        );

        Ok(Quote {
            router: result.router,
            amount: result.amountOut,
        })
    }

    #[instrument(skip(self), err)]
    async fn get_amount_in(
        &self,
        token: Address,
        amount_out: U256,
        is_buy: bool,
    ) -> RepoResult<Quote> {
        let lens = ILens::new(self.contracts.lens, self.provider.clone());

        let result = lens
            .getAmountIn(token, amount_out, is_buy)
            .call()
            .await
            .map_err(|e| call_error("Failed to get amount in", e))?;

        Ok(Quote {
            router: result.router,
            amount: result.amountIn,
        })
    }

    #[instrument(skip(self), err)]
    async fn get_progress(&self, token: Address) -> RepoResult<U256> {
        ILens::new(self.contracts.lens, self.provider.clone())
            .getProgress(token)
            .call()
            .await
            .map_err(|e| call_error("Failed to get progress", e))
    }

    #[instrument(skip(self), err)]
    async fn is_graduated(&self, token: Address) -> RepoResult<bool> {
        ILens::new(self.contracts.lens, self.provider.clone())
            .isGraduated(token)
            .call()
            .await
            .map_err(|e| call_error("Failed to read graduation status", e))
    }

    #[instrument(skip(self), err)]
    async fn is_locked(&self, token: Address) -> RepoResult<bool> {
        ILens::new(self.contracts.lens, self.provider.clone())
            .isLocked(token)
            .call()
            .await
            .map_err(|e| call_error("Failed to read lock status", e))
    }

    #[instrument(skip(self), err)]
    async fn available_buy_tokens(&self, token: Address) -> RepoResult<(U256, U256)> {
        let result = ILens::new(self.contracts.lens, self.provider.clone())
            .availableBuyTokens(token)
            .call()
            .await
            .map_err(|e| call_error("Failed to get available buy tokens", e))?;

        Ok((result.availableBuyToken, result.requiredMonAmount))
    }

    #[instrument(skip(self), err)]
    async fn curve_state(&self, token: Address) -> RepoResult<CurveState> {
        let curve = IBondingCurve::new(self.contracts.curve, self.provider.clone());

        let state = curve
            .curves(token)
            .call()
            .await
            .map_err(|e| call_error("Failed to read curve state", e))?;

        Ok(CurveState {
            real_mon_reserve: state.realMonReserve,
            real_token_reserve: state.realTokenReserve,
            virtual_mon_reserve: state.virtualMonReserve,
            virtual_token_reserve: state.virtualTokenReserve,
            k: state.k,
            target_token_amount: state.targetTokenAmount,
            init_virtual_mon_reserve: state.initVirtualMonReserve,
            init_virtual_token_reserve: state.initVirtualTokenReserve,
        })
    }

    #[instrument(skip(self), err)]
    async fn execute_trade(&self, router: Address, call: &TradeCall) -> RepoResult<TxOutcome> {
        self.require_signer(call.name())?;
        let router = IRouter::new(router, self.provider.clone());

        let pending = match call {
            TradeCall::Buy(buy) => {
                router
                    .buy(IRouter::BuyParams {
                        amountOutMin: buy.amount_out_min,
                        token: buy.token,
                        to: buy.to,
                        deadline: buy.deadline,
                    })
                    .value(buy.amount_in)
                    .send()
                    .await
            }
            TradeCall::Sell(sell) => {
                router
                    .sell(IRouter::SellParams {
                        amountIn: sell.amount_in,
                        amountOutMin: sell.amount_out_min,
                        token: sell.token,
                        to: sell.to,
                        deadline: sell.deadline,
                    })
                    .send()
                    .await
            }
            TradeCall::SellPermit(permit) => {
                router
                    .sellPermit(IRouter::SellPermitParams {
                        amountIn: permit.amount_in,
                        amountOutMin: permit.amount_out_min,
                        amountAllowance: permit.amount_allowance,
                        token: permit.token,
                        to: permit.to,
                        deadline: permit.deadline,
                        v: permit.v,
                        r: permit.r,
                        s: permit.s,
                    })
                    .send()
                    .await
            }
        }
        .map_err(|e| call_error(&format!("Failed to send {}", call.name()), e))?;

        tracing::info!("{} sent: {}", call.name(), pending.tx_hash());

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| confirm_error(&format!("Failed to confirm {}", call.name()), e))?;

        outcome(receipt).ensure_success(call.name())
    }

    #[instrument(skip(self), err)]
    async fn estimate_trade_gas(
        &self,
        router: Address,
        call: &TradeCall,
        from: Address,
    ) -> RepoResult<u64> {
        let router = IRouter::new(router, self.provider.clone());

        let estimate = match call {
            TradeCall::Buy(buy) => {
                router
                    .buy(IRouter::BuyParams {
                        amountOutMin: buy.amount_out_min,
                        token: buy.token,
                        to: buy.to,
                        deadline: buy.deadline,
                    })
                    .value(buy.amount_in)
                    .from(from)
                    .estimate_gas()
                    .await
            }
            TradeCall::Sell(sell) => {
                router
                    .sell(IRouter::SellParams {
                        amountIn: sell.amount_in,
                        amountOutMin: sell.amount_out_min,
                        token: sell.token,
                        to: sell.to,
                        deadline: sell.deadline,
                    })
                    .from(from)
                    .estimate_gas()
                    .await
            }
            TradeCall::SellPermit(permit) => {
                router
                    .sellPermit(IRouter::SellPermitParams {
                        amountIn: permit.amount_in,
                        amountOutMin: permit.amount_out_min,
                        amountAllowance: permit.amount_allowance,
                        token: permit.token,
                        to: permit.to,
                        deadline: permit.deadline,
                        v: permit.v,
                        r: permit.r,
                        s: permit.s,
                    })
                    .from(from)
                    .estimate_gas()
                    .await
            }
        };

        estimate.map_err(|e| {
            tracing::debug!("Gas estimation for {} failed: {}", call.name(), e);
            call_error(&format!("Failed to estimate {} gas", call.name()), e)
        })
    }

    #[instrument(skip(self), err)]
    async fn native_balance(&self, owner: Address) -> RepoResult<U256> {
        self.provider.get_balance(owner).await.map_err(|e| {
            if e.to_string().contains("429") {
                tracing::warn!("Rate limited while getting native balance for {}", owner);
            }
            RepositoryError::from_transport(e.to_string())
        })
    }

    #[instrument(skip(self), err)]
    async fn token_metadata(&self, token: Address) -> RepoResult<TokenMetadata> {
        let contract = IERC20::new(token, self.provider.clone());

        let name = contract
            .name()
            .call()
            .await
            .map_err(|e| call_error("Failed to get name", e))?;

        let symbol = contract
            .symbol()
            .call()
            .await
            .map_err(|e| call_error("Failed to get symbol", e))?;

        let decimals = contract
            .decimals()
            .call()
            .await
            .map_err(|e| call_error("Failed to get decimals", e))?;

        let total_supply = contract
            .totalSupply()
            .call()
            .await
            .map_err(|e| call_error("Failed to get total supply", e))?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
            total_supply,
        })
    }

    #[instrument(skip(self), err)]
    async fn balance_of(&self, token: Address, owner: Address) -> RepoResult<U256> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| call_error("Failed to get balance", e))
    }

    #[instrument(skip(self), err)]
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> RepoResult<U256> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| call_error("Failed to get allowance", e))
    }

    #[instrument(skip(self), err)]
    async fn nonces(&self, token: Address, owner: Address) -> RepoResult<U256> {
        IERC20::new(token, self.provider.clone())
            .nonces(owner)
            .call()
            .await
            .map_err(|e| call_error("Failed to get permit nonce", e))
    }

    #[instrument(skip(self), err)]
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> RepoResult<TxOutcome> {
        self.require_signer("approve")?;

        let receipt = IERC20::new(token, self.provider.clone())
            .approve(spender, amount)
            .send()
            .await
            .map_err(|e| call_error("Failed to send approve", e))?
            .get_receipt()
            .await
            .map_err(|e| confirm_error("Failed to confirm approve", e))?;

        outcome(receipt).ensure_success("approve")
    }

    #[instrument(skip(self), err)]
    async fn transfer(&self, token: Address, to: Address, amount: U256) -> RepoResult<TxOutcome> {
        self.require_signer("transfer")?;

        let receipt = IERC20::new(token, self.provider.clone())
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| call_error("Failed to send transfer", e))?
            .get_receipt()
            .await
            .map_err(|e| confirm_error("Failed to confirm transfer", e))?;

        outcome(receipt).ensure_success("transfer")
    }

    #[instrument(skip(self), err)]
    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> RepoResult<Option<Address>> {
        let factory = IUniswapV3Factory::new(self.contracts.dex_factory, self.provider.clone());

        let pool = factory
            .getPool(token_a, token_b, U24::from(fee))
            .call()
            .await
            .map_err(|e| call_error("Failed to get pool", e))?;

        // Zero address means no pool for this fee tier
        Ok((pool != Address::ZERO).then_some(pool))
    }

    #[instrument(skip(self, hash), err)]
    async fn sign_hash(&self, hash: B256) -> RepoResult<Signature> {
        self.require_signer("permit signature")?
            .sign_hash(&hash)
            .await
            .map_err(|e| RepositoryError::Other(format!("Failed to sign: {e}")))
    }
}
