//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, cycle detection)
//!     → ResilienceConfig (validated, immutable)
//!     → DependencyDescriptor per dependency, HealthGraph from the edges
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_str, ConfigError};
pub use schema::{DependencyConfig, EdgeConfig, ListenerConfig, OperationConfig, ResilienceConfig};
pub use validation::{validate_config, ValidationError};
