//! Shared configuration and logging setup for diffbudget.
//!
//! - `config`: layered TOML configuration (global, repository, explicit file)
//! - `logging`: tracing subscriber initialization

pub mod config;
pub mod logging;

pub use config::{BudgetConfig, Config, ConfigError, TruncationConfig};
