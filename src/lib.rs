pub mod booking;
pub mod cache;
pub mod config;
pub mod correlation;
pub mod domain;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod publish;
pub mod retry;
pub mod shutdown;
pub mod store;

pub use booking::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use kafka::*;
pub use store::*;
