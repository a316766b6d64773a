use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::repository::{BuyCall, Quote, SellCall, SellPermitCall, TradeCall, TxOutcome};

/// Seconds until a router deadline when the caller does not give one.
pub const DEFAULT_DEADLINE_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyParams {
    /// Router executing the trade, usually the one returned by a quote
    pub router: Address,
    pub token: Address,
    /// Native amount spent
    pub amount_in: U256,
    /// Minimum tokens received
    pub amount_out_min: U256,
    /// Recipient, defaults to the wallet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Unix deadline, defaults to one hour from now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellParams {
    pub router: Address,
    pub token: Address,
    /// Tokens sold
    pub amount_in: U256,
    /// Minimum native amount received
    pub amount_out_min: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellPermitParams {
    pub router: Address,
    pub token: Address,
    pub amount_in: U256,
    pub amount_out_min: U256,
    /// Allowance granted by the permit, at least `amount_in`
    pub amount_allowance: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Must equal the deadline the permit was signed with
    pub deadline: U256,
    pub signature: PermitSignature,
}

/// An EIP-2612 permit signature split into its `(v, r, s)` parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
    /// Nonce the permit was signed over
    pub nonce: U256,
    pub deadline: U256,
}

/// Which router call to estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GasEstimationParams {
    Buy(BuyParams),
    Sell(SellParams),
    SellPermit(SellPermitParams),
}

/// Result of a `simple_*` convenience trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleTradeResult {
    pub quote: Quote,
    pub amount_out_min: U256,
    /// Approval sent before a sell when the allowance was short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<TxOutcome>,
    pub trade: TxOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub token: Address,
    pub owner: Address,
    pub balance: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenAllowance {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub allowance: U256,
}

impl BuyParams {
    pub(crate) fn into_call(self, wallet: Address, deadline: U256) -> (Address, TradeCall) {
        let call = BuyCall {
            token: self.token,
            amount_in: self.amount_in,
            amount_out_min: self.amount_out_min,
            to: self.to.unwrap_or(wallet),
            deadline: self.deadline.unwrap_or(deadline),
        };
        (self.router, TradeCall::Buy(call))
    }
}

impl SellParams {
    pub(crate) fn into_call(self, wallet: Address, deadline: U256) -> (Address, TradeCall) {
        let call = SellCall {
            token: self.token,
            amount_in: self.amount_in,
            amount_out_min: self.amount_out_min,
            to: self.to.unwrap_or(wallet),
            deadline: self.deadline.unwrap_or(deadline),
        };
        (self.router, TradeCall::Sell(call))
    }
}

impl SellPermitParams {
    pub(crate) fn into_call(self, wallet: Address) -> (Address, TradeCall) {
        let call = SellPermitCall {
            token: self.token,
            amount_in: self.amount_in,
            amount_out_min: self.amount_out_min,
            amount_allowance: self.amount_allowance,
            to: self.to.unwrap_or(wallet),
            deadline: self.deadline,
            v: self.signature.v,
            r: self.signature.r,
            s: self.signature.s,
        };
        (self.router, TradeCall::SellPermit(call))
    }
}
