pub mod indexer;
pub mod parser;
pub mod retry;
pub mod stream;
pub mod types;

pub use indexer::{CurveIndexer, DEX_FEE_TIERS, DexIndexer};
pub use parser::{event_signature, parse_curve_log, parse_swap_log};
pub use retry::RetryPolicy;
pub use stream::{
    ErrorCallback, EventCallback, EventStream, ListenerId, StreamError, StreamHealth,
    TargetState, TargetStatus,
};
pub use types::*;
