use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

use crate::service::{ServiceError, ServiceResult};

/// Position and origin of the log an event was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventMeta {
    /// Emitting contract: the curve for curve events, the pool for swaps
    pub address: Address,
    pub block_number: u64,
    pub transaction_hash: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<u64>,
    pub log_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub creator: Address,
    pub token: Address,
    pub pool: Address,
    pub name: String,
    pub symbol: String,
    pub token_uri: String,
    pub virtual_mon: U256,
    pub virtual_token: U256,
    pub target_token_amount: U256,
}

/// A curve buy or sell. For buys `amount_in` is native and `amount_out` is
/// tokens; sells are the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub sender: Address,
    pub token: Address,
    pub amount_in: U256,
    pub amount_out: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub token: Address,
    pub real_mon_reserve: U256,
    pub real_token_reserve: U256,
    pub virtual_mon_reserve: U256,
    pub virtual_token_reserve: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenLockedEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub token: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraduateEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub token: Address,
    pub pool: Address,
}

/// A DEX pool swap. Amounts are signed from the pool's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub sender: Address,
    pub recipient: Address,
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U160,
    pub liquidity: u128,
    pub tick: i32,
}

/// A decoded launchpad event, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    Create(CreateEvent),
    Buy(TradeEvent),
    Sell(TradeEvent),
    Sync(SyncEvent),
    TokenLocked(TokenLockedEvent),
    Graduate(GraduateEvent),
    Swap(SwapEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Create(_) => EventKind::Create,
            DomainEvent::Buy(_) => EventKind::Buy,
            DomainEvent::Sell(_) => EventKind::Sell,
            DomainEvent::Sync(_) => EventKind::Sync,
            DomainEvent::TokenLocked(_) => EventKind::TokenLocked,
            DomainEvent::Graduate(_) => EventKind::Graduate,
            DomainEvent::Swap(_) => EventKind::Swap,
        }
    }

    pub fn meta(&self) -> &EventMeta {
        match self {
            DomainEvent::Create(e) => &e.meta,
            DomainEvent::Buy(e) | DomainEvent::Sell(e) => &e.meta,
            DomainEvent::Sync(e) => &e.meta,
            DomainEvent::TokenLocked(e) => &e.meta,
            DomainEvent::Graduate(e) => &e.meta,
            DomainEvent::Swap(e) => &e.meta,
        }
    }

    /// The launchpad token the event is about. Swaps carry none.
    pub fn token(&self) -> Option<Address> {
        match self {
            DomainEvent::Create(e) => Some(e.token),
            DomainEvent::Buy(e) | DomainEvent::Sell(e) => Some(e.token),
            DomainEvent::Sync(e) => Some(e.token),
            DomainEvent::TokenLocked(e) => Some(e.token),
            DomainEvent::Graduate(e) => Some(e.token),
            DomainEvent::Swap(_) => None,
        }
    }

    /// Chronological sort key.
    pub fn position(&self) -> (u64, u64) {
        let meta = self.meta();
        (meta.block_number, meta.log_index)
    }

    /// Identity of the underlying log.
    pub fn log_id(&self) -> LogId {
        let meta = self.meta();
        LogId {
            block_number: meta.block_number,
            transaction_hash: meta.transaction_hash,
            log_index: meta.log_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogId {
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u64,
}

/// Sorts by `(block_number, log_index)` and drops repeated logs.
pub fn sort_and_dedup(events: &mut Vec<DomainEvent>) {
    events.sort_by_key(|e| (e.position(), e.meta().transaction_hash));
    let mut seen = HashSet::with_capacity(events.len());
    events.retain(|e| seen.insert(e.log_id()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Buy,
    Sell,
    Sync,
    TokenLocked,
    Graduate,
    Swap,
}

impl EventKind {
    /// Kinds emitted by the bonding curve.
    pub const CURVE: [EventKind; 6] = [
        EventKind::Create,
        EventKind::Buy,
        EventKind::Sell,
        EventKind::Sync,
        EventKind::TokenLocked,
        EventKind::Graduate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "Create",
            EventKind::Buy => "Buy",
            EventKind::Sell => "Sell",
            EventKind::Sync => "Sync",
            EventKind::TokenLocked => "TokenLocked",
            EventKind::Graduate => "Graduate",
            EventKind::Swap => "Swap",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(EventKind::Create),
            "buy" => Ok(EventKind::Buy),
            "sell" => Ok(EventKind::Sell),
            "sync" => Ok(EventKind::Sync),
            "tokenlocked" | "lock" => Ok(EventKind::TokenLocked),
            "graduate" | "listed" => Ok(EventKind::Graduate),
            "swap" => Ok(EventKind::Swap),
            _ => Err(ServiceError::InvalidArgument(format!("unknown event type: {s}"))),
        }
    }
}

/// Token and event-type allow-lists, combined with AND.
///
/// An absent or empty list allows everything. Events without a token field
/// (swaps) always pass the token list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    tokens: Option<HashSet<Address>>,
    kinds: Option<HashSet<EventKind>>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = Address>) -> Self {
        let tokens: HashSet<_> = tokens.into_iter().collect();
        self.tokens = (!tokens.is_empty()).then_some(tokens);
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let kinds: HashSet<_> = kinds.into_iter().collect();
        self.kinds = (!kinds.is_empty()).then_some(kinds);
        self
    }

    /// Token allow-list from hex strings in any letter case.
    pub fn with_token_strs<S: AsRef<str>>(self, tokens: &[S]) -> ServiceResult<Self> {
        let tokens = tokens
            .iter()
            .map(|s| {
                Address::from_str(s.as_ref().trim())
                    .map_err(|e| ServiceError::InvalidAddress(format!("{}: {e}", s.as_ref())))
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(self.with_tokens(tokens))
    }

    pub fn tokens(&self) -> Option<&HashSet<Address>> {
        self.tokens.as_ref()
    }

    pub fn kinds(&self) -> Option<&HashSet<EventKind>> {
        self.kinds.as_ref()
    }

    /// Whether `kind` can pass this filter at all.
    pub fn allows_kind(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    pub fn matches(&self, event: &DomainEvent) -> bool {
        if !self.allows_kind(event.kind()) {
            return false;
        }
        match (&self.tokens, event.token()) {
            (Some(tokens), Some(token)) => tokens.contains(&token),
            _ => true,
        }
    }
}

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> ServiceResult<Self> {
        if to < from {
            return Err(ServiceError::InvalidArgument(format!(
                "block range end {to} is before start {from}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn block_count(&self) -> u64 {
        (self.to - self.from).saturating_add(1)
    }

    /// Splits the range into contiguous chunks of at most `size` blocks:
    /// `[from + k*size, min(from + (k+1)*size - 1, to)]`.
    pub fn batches(self, size: u64) -> impl Iterator<Item = BlockRange> {
        let size = size.max(1);
        let mut next = Some(self.from);
        std::iter::from_fn(move || {
            let from = next?;
            let to = from.saturating_add(size - 1).min(self.to);
            next = (to < self.to).then(|| to + 1);
            Some(BlockRange { from, to })
        })
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}
