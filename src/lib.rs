pub mod config;
pub mod event;
pub mod repository;
pub mod sdk;
pub mod service;

pub use config::{Config, ContractAddresses, Network};
pub use event::{
    CurveIndexer, DexIndexer, DomainEvent, EventFilter, EventKind, EventStream, StreamError,
    StreamHealth,
};
pub use sdk::LaunchpadSdk;
pub use service::{ServiceError, TokenService, TradingService};
