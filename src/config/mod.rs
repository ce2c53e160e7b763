//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RedirectsConfig (validated, immutable)
//!     → consumed once at startup by main.rs
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Rules are data, not config: they live in the rule store

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ContentConfig, ContentNodeConfig, ListenerConfig, ObservabilityConfig,
    RedirectsConfig, SiteConfig, StoreConfig, TimeoutConfig,
};

