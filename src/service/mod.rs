pub mod error;
pub mod token;
pub mod trading;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

pub use error::ServiceError;
pub use token::TokenService;
pub use trading::TradingService;
pub use types::*;

pub(crate) type ServiceResult<T> = std::result::Result<T, ServiceError>;
