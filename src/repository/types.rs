use alloy::primitives::{Address, B256, U256};
use serde::Serialize;

use super::error::RepositoryError;

/// A point-in-time quote from the lens: which router executes the trade and the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub router: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

/// Reserve state of a token's bonding curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurveState {
    pub real_mon_reserve: U256,
    pub real_token_reserve: U256,
    pub virtual_mon_reserve: U256,
    pub virtual_token_reserve: U256,
    pub k: U256,
    pub target_token_amount: U256,
    pub init_virtual_mon_reserve: U256,
    pub init_virtual_token_reserve: U256,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

impl TxOutcome {
    /// Passes a successful transaction through; a reverted one becomes a
    /// `ContractError` naming `action` and the transaction hash.
    pub fn ensure_success(self, action: &str) -> Result<Self, RepositoryError> {
        if self.success {
            Ok(self)
        } else {
            Err(RepositoryError::ContractError(format!(
                "{action} reverted in {}",
                self.tx_hash
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyCall {
    pub token: Address,
    /// Native value attached to the call.
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub to: Address,
    pub deadline: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellCall {
    pub token: Address,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub to: Address,
    pub deadline: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellPermitCall {
    pub token: Address,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub amount_allowance: U256,
    pub to: Address,
    pub deadline: U256,
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// One router call, as executed or gas-estimated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeCall {
    Buy(BuyCall),
    Sell(SellCall),
    SellPermit(SellPermitCall),
}

impl TradeCall {
    pub fn token(&self) -> Address {
        match self {
            TradeCall::Buy(call) => call.token,
            TradeCall::Sell(call) => call.token,
            TradeCall::SellPermit(call) => call.token,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TradeCall::Buy(_) => "buy",
            TradeCall::Sell(_) => "sell",
            TradeCall::SellPermit(_) => "sellPermit",
        }
    }
}
