//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply BFF_* environment overrides)
//!     → CLI flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, BackendConfig, CatchAllConfig, DiagnosticsConfig, GatewayConfig, LimitsConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, RouteConfig, StreamingConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
