//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CallerConfig (validated, immutable)
//!     → consumed once by ResilientCaller::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new caller
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BulkheadConfig;
pub use schema::CallerConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::DeadlineConfig;
pub use schema::LayerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::RetryConfig;
pub use schema::Scenario;
pub use schema::TargetConfig;
