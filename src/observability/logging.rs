//! Structured logging init.
//!
//! # Design Decisions
//! - Uses `tracing`/`tracing-subscriber`; JSON format for production, pretty
//!   for development, selected by `ObservabilityConfig.log_format`
//! - Log level configurable via config, overridable by `RUST_LOG`/
//!   `GATECORE_LOG_LEVEL` (the latter applied before config load in
//!   `config::loader::apply_env_overrides`)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
