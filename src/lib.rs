//! Traced HTTP delay chain: caller → middleman (fan-out) → receiver.

pub mod caller;
pub mod config;
pub mod fanout;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod receiver;

pub use config::schema::ChainConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
