//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), path from --config or DELAY_CHAIN_CONFIG
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ChainConfig (validated, immutable)
//!     → each service reads its own section
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{CallerConfig, ChainConfig, MiddlemanConfig, ObservabilityConfig, ReceiverConfig};
pub use validation::ValidationError;
