//! AI task gateway: task catalog, output contracts, circuit breakers and the
//! vendor adapters behind them.

pub mod breaker;
pub mod error;
pub mod gateway;
pub mod schema;
pub mod task;
pub mod timing;
pub mod vendors;
