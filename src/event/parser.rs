//! Decoding of raw contract logs into [`DomainEvent`]s.
//!
//! Parsing is pure: no I/O, no state, and the same log always yields the same
//! event. A log that does not decode yields `None` and is logged at debug.

use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;

use super::types::{
    CreateEvent, DomainEvent, EventKind, EventMeta, GraduateEvent, SwapEvent, SyncEvent,
    TokenLockedEvent, TradeEvent,
};
use crate::repository::contract::IBondingCurve::{
    CurveBuy, CurveCreate, CurveGraduate, CurveSell, CurveSync, CurveTokenLocked,
};
use crate::repository::contract::IUniswapV3Pool::Swap;

/// Topic0 of the on-chain event behind `kind`.
pub fn event_signature(kind: EventKind) -> B256 {
    match kind {
        EventKind::Create => CurveCreate::SIGNATURE_HASH,
        EventKind::Buy => CurveBuy::SIGNATURE_HASH,
        EventKind::Sell => CurveSell::SIGNATURE_HASH,
        EventKind::Sync => CurveSync::SIGNATURE_HASH,
        EventKind::TokenLocked => CurveTokenLocked::SIGNATURE_HASH,
        EventKind::Graduate => CurveGraduate::SIGNATURE_HASH,
        EventKind::Swap => Swap::SIGNATURE_HASH,
    }
}

fn event_meta(log: &Log, timestamp: Option<u64>) -> Option<EventMeta> {
    let (Some(block_number), Some(transaction_hash), Some(log_index)) =
        (log.block_number, log.transaction_hash, log.log_index)
    else {
        tracing::debug!("Skipping log without a mined position from {}", log.address());
        return None;
    };

    Some(EventMeta {
        address: log.address(),
        block_number,
        transaction_hash,
        transaction_index: log.transaction_index,
        log_index,
        block_timestamp: timestamp.or(log.block_timestamp),
    })
}

fn decode<E: SolEvent>(log: &Log) -> Option<E> {
    match E::decode_log(&log.inner) {
        Ok(decoded) => Some(decoded.data),
        Err(e) => {
            tracing::debug!(
                "Failed to decode {} at block {:?} index {:?}: {e}",
                E::SIGNATURE,
                log.block_number,
                log.log_index
            );
            None
        }
    }
}

/// Decodes a bonding-curve log.
///
/// `timestamp` overrides the log's own `block_timestamp` when given.
pub fn parse_curve_log(log: &Log, timestamp: Option<u64>) -> Option<DomainEvent> {
    let topic0 = *log.topics().first()?;

    let event = if topic0 == CurveCreate::SIGNATURE_HASH {
        let e = decode::<CurveCreate>(log)?;
        DomainEvent::Create(CreateEvent {
            meta: event_meta(log, timestamp)?,
            creator: e.creator,
            token: e.token,
            pool: e.pool,
            name: e.name,
            symbol: e.symbol,
            token_uri: e.tokenURI,
            virtual_mon: e.virtualMon,
            virtual_token: e.virtualToken,
            target_token_amount: e.targetTokenAmount,
        })
    } else if topic0 == CurveBuy::SIGNATURE_HASH {
        let e = decode::<CurveBuy>(log)?;
        DomainEvent::Buy(TradeEvent {
            meta: event_meta(log, timestamp)?,
            sender: e.sender,
            token: e.token,
            amount_in: e.amountIn,
            amount_out: e.amountOut,
        })
    } else if topic0 == CurveSell::SIGNATURE_HASH {
        let e = decode::<CurveSell>(log)?;
        DomainEvent::Sell(TradeEvent {
            meta: event_meta(log, timestamp)?,
            sender: e.sender,
            token: e.token,
            amount_in: e.amountIn,
            amount_out: e.amountOut,
        })
    } else if topic0 == CurveSync::SIGNATURE_HASH {
        let e = decode::<CurveSync>(log)?;
        DomainEvent::Sync(SyncEvent {
            meta: event_meta(log, timestamp)?,
            token: e.token,
            real_mon_reserve: e.realMonReserve,
            real_token_reserve: e.realTokenReserve,
            virtual_mon_reserve: e.virtualMonReserve,
            virtual_token_reserve: e.virtualTokenReserve,
        })
    } else if topic0 == CurveTokenLocked::SIGNATURE_HASH {
        let e = decode::<CurveTokenLocked>(log)?;
        DomainEvent::TokenLocked(TokenLockedEvent {
            meta: event_meta(log, timestamp)?,
            token: e.token,
        })
    } else if topic0 == CurveGraduate::SIGNATURE_HASH {
        let e = decode::<CurveGraduate>(log)?;
        DomainEvent::Graduate(GraduateEvent {
            meta: event_meta(log, timestamp)?,
            token: e.token,
            pool: e.pool,
        })
    } else {
        tracing::debug!("Unknown curve event topic {topic0}");
        return None;
    };

    Some(event)
}

/// Decodes a DEX pool `Swap` log.
pub fn parse_swap_log(log: &Log, timestamp: Option<u64>) -> Option<DomainEvent> {
    let e = decode::<Swap>(log)?;
    Some(DomainEvent::Swap(SwapEvent {
        meta: event_meta(log, timestamp)?,
        sender: e.sender,
        recipient: e.recipient,
        amount0: e.amount0,
        amount1: e.amount1,
        sqrt_price_x96: e.sqrtPriceX96,
        liquidity: e.liquidity,
        tick: e.tick.as_i32(),
    }))
}
