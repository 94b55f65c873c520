//! Process-level plumbing shared by repokit binaries: layered configuration
//! (defaults → YAML → `APP__` environment) and `tracing` setup.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CliArgs, LoggingConfig, Section};
pub use logging::init_logging_from_config;
