use std::sync::Arc;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::repository::{CurveState, LaunchpadRepository, Quote, TxOutcome};
use crate::service::token::TokenService;
use crate::service::types::{
    BuyParams, DEFAULT_DEADLINE_SECS, GasEstimationParams, SellParams, SellPermitParams,
    SimpleTradeResult,
};
use crate::service::utils::{calculate_minimum_output, deadline_from_now, slippage_to_bps};
use crate::service::{ServiceError, ServiceResult};

/// Quote and trade façade over the lens and the routers.
///
/// Operations map onto single gateway calls, or a short fixed sequence for the
/// `simple_*` helpers (quote, slippage, optional approval, trade). Nothing is
/// retried here: a reverted trade or an RPC timeout surfaces as-is so the
/// caller can decide whether to re-quote, re-approve or give up.
#[derive(Clone)]
pub struct TradingService {
    repository: Arc<dyn LaunchpadRepository>,
    tokens: TokenService,
}

fn require_positive(amount: U256, what: &str) -> ServiceResult<()> {
    if amount.is_zero() {
        return Err(ServiceError::InvalidAmount(format!("{what} must be positive")));
    }
    Ok(())
}

// Quotes and curve reads
impl TradingService {
    pub fn new(repository: Arc<dyn LaunchpadRepository>, chain_id: u64) -> Self {
        let tokens = TokenService::new(repository.clone(), chain_id);
        Self { repository, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Quotes the output of spending `amount_in`.
    ///
    /// # Arguments
    ///
    /// * `token` - The launchpad token
    /// * `amount_in` - Native amount for buys, token amount for sells
    /// * `is_buy` - Direction of the trade
    ///
    /// # Returns
    ///
    /// * `Ok(Quote)` - Router to trade through and the expected output
    /// * `Err(ServiceError)` - If `amount_in` is zero or the lens call fails
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let quote = trading.get_amount_out(token, parse_amount("1", 18)?, true).await?;
    /// ```
    #[instrument(skip(self), err)]
    pub async fn get_amount_out(
        &self,
        token: Address,
        amount_in: U256,
        is_buy: bool,
    ) -> ServiceResult<Quote> {
        require_positive(amount_in, "amount_in")?;
        Ok(self.repository.get_amount_out(token, amount_in, is_buy).await?)
    }

    /// Quotes the input needed to receive `amount_out`.
    #[instrument(skip(self), err)]
    pub async fn get_amount_in(
        &self,
        token: Address,
        amount_out: U256,
        is_buy: bool,
    ) -> ServiceResult<Quote> {
        require_positive(amount_out, "amount_out")?;
        Ok(self.repository.get_amount_in(token, amount_out, is_buy).await?)
    }

    /// Bonding progress in basis points.
    #[instrument(skip(self), err)]
    pub async fn get_progress(&self, token: Address) -> ServiceResult<U256> {
        Ok(self.repository.get_progress(token).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn is_graduated(&self, token: Address) -> ServiceResult<bool> {
        Ok(self.repository.is_graduated(token).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn is_locked(&self, token: Address) -> ServiceResult<bool> {
        Ok(self.repository.is_locked(token).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn curve_state(&self, token: Address) -> ServiceResult<CurveState> {
        Ok(self.repository.curve_state(token).await?)
    }

    /// Tokens still purchasable on the curve and the native amount they cost.
    #[instrument(skip(self), err)]
    pub async fn available_buy_tokens(&self, token: Address) -> ServiceResult<(U256, U256)> {
        Ok(self.repository.available_buy_tokens(token).await?)
    }
}

// Router writes
impl TradingService {
    #[instrument(skip(self), err)]
    pub async fn buy(&self, params: BuyParams) -> ServiceResult<TxOutcome> {
        require_positive(params.amount_in, "amount_in")?;
        let wallet = self.tokens.require_wallet("buy")?;

        let (router, call) = params.into_call(wallet, deadline_from_now(DEFAULT_DEADLINE_SECS));
        let outcome = self.repository.execute_trade(router, &call).await?;
        tracing::info!("Buy of {} mined in {}", call.token(), outcome.tx_hash);
        Ok(outcome)
    }

    /// Sells through the router. The router must already hold an allowance
    /// for `amount_in`.
    #[instrument(skip(self), err)]
    pub async fn sell(&self, params: SellParams) -> ServiceResult<TxOutcome> {
        require_positive(params.amount_in, "amount_in")?;
        let wallet = self.tokens.require_wallet("sell")?;

        let (router, call) = params.into_call(wallet, deadline_from_now(DEFAULT_DEADLINE_SECS));
        let outcome = self.repository.execute_trade(router, &call).await?;
        tracing::info!("Sell of {} mined in {}", call.token(), outcome.tx_hash);
        Ok(outcome)
    }

    #[instrument(skip(self), err)]
    pub async fn sell_permit(&self, params: SellPermitParams) -> ServiceResult<TxOutcome> {
        require_positive(params.amount_in, "amount_in")?;
        if params.amount_allowance < params.amount_in {
            return Err(ServiceError::InvalidAmount(format!(
                "permit allowance {} is below amount_in {}",
                params.amount_allowance, params.amount_in
            )));
        }
        let wallet = self.tokens.require_wallet("sellPermit")?;

        let (router, call) = params.into_call(wallet);
        let outcome = self.repository.execute_trade(router, &call).await?;
        tracing::info!("Permit sell of {} mined in {}", call.token(), outcome.tx_hash);
        Ok(outcome)
    }

    /// Estimates gas for a router call sent from the wallet.
    #[instrument(skip(self), err)]
    pub async fn estimate_gas(&self, params: GasEstimationParams) -> ServiceResult<u64> {
        let wallet = self.tokens.require_wallet("gas estimation")?;
        let deadline = deadline_from_now(DEFAULT_DEADLINE_SECS);

        let (router, call) = match params {
            GasEstimationParams::Buy(params) => params.into_call(wallet, deadline),
            GasEstimationParams::Sell(params) => params.into_call(wallet, deadline),
            GasEstimationParams::SellPermit(params) => params.into_call(wallet),
        };

        Ok(self
            .repository
            .estimate_trade_gas(router, &call, wallet)
            .await?)
    }
}

// Convenience layer
impl TradingService {
    /// Buys `token` for `amount_in` native units, accepting at most
    /// `slippage_percent` less than quoted.
    #[instrument(skip(self), err)]
    pub async fn simple_buy(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Decimal,
    ) -> ServiceResult<SimpleTradeResult> {
        slippage_to_bps(slippage_percent)?;
        self.tokens.require_wallet("buy")?;

        let quote = self.get_amount_out(token, amount_in, true).await?;
        let amount_out_min = calculate_minimum_output(quote.amount, slippage_percent)?;
        tracing::info!(
            "Buying {token} for {amount_in}: quoted {} via {}, minimum {amount_out_min}",
            quote.amount,
            quote.router
        );

        let trade = self
            .buy(BuyParams {
                router: quote.router,
                token,
                amount_in,
                amount_out_min,
                to: None,
                deadline: None,
            })
            .await?;

        Ok(SimpleTradeResult {
            quote,
            amount_out_min,
            approval: None,
            trade,
        })
    }

    /// Sells `amount_in` of `token`, approving the quoted router first when
    /// the current allowance is short.
    #[instrument(skip(self), err)]
    pub async fn simple_sell(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Decimal,
    ) -> ServiceResult<SimpleTradeResult> {
        slippage_to_bps(slippage_percent)?;
        let wallet = self.tokens.require_wallet("sell")?;

        let quote = self.get_amount_out(token, amount_in, false).await?;
        let amount_out_min = calculate_minimum_output(quote.amount, slippage_percent)?;

        let allowance = self.tokens.allowance(token, wallet, quote.router).await?;
        let approval = if allowance < amount_in {
            tracing::info!(
                "Allowance {allowance} to {} is below {amount_in}, approving",
                quote.router
            );
            Some(self.tokens.approve(token, quote.router, amount_in).await?)
        } else {
            None
        };

        let trade = self
            .sell(SellParams {
                router: quote.router,
                token,
                amount_in,
                amount_out_min,
                to: None,
                deadline: None,
            })
            .await?;

        Ok(SimpleTradeResult {
            quote,
            amount_out_min,
            approval,
            trade,
        })
    }

    /// Sells `amount_in` of `token` in one transaction, granting the router's
    /// allowance with a signed permit instead of an approval.
    #[instrument(skip(self), err)]
    pub async fn simple_sell_permit(
        &self,
        token: Address,
        amount_in: U256,
        slippage_percent: Decimal,
    ) -> ServiceResult<SimpleTradeResult> {
        slippage_to_bps(slippage_percent)?;
        self.tokens.require_wallet("sellPermit")?;

        let quote = self.get_amount_out(token, amount_in, false).await?;
        let amount_out_min = calculate_minimum_output(quote.amount, slippage_percent)?;

        let deadline = deadline_from_now(DEFAULT_DEADLINE_SECS);
        let signature = self
            .tokens
            .generate_permit_signature(token, quote.router, amount_in, deadline)
            .await?;

        let trade = self
            .sell_permit(SellPermitParams {
                router: quote.router,
                token,
                amount_in,
                amount_out_min,
                amount_allowance: amount_in,
                to: None,
                deadline,
                signature,
            })
            .await?;

        Ok(SimpleTradeResult {
            quote,
            amount_out_min,
            approval: None,
            trade,
        })
    }
}
