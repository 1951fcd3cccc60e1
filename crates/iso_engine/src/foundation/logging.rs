//! Logger setup for hosts embedding the engine
//!
//! The engine only emits through the `log` facade; installing a backend is
//! left to the host. These helpers wire up `env_logger` from the engine
//! configuration.

use crate::core::EngineConfig;

/// Install `env_logger` with a default filter (e.g. `"info"`, `"iso_engine=debug"`)
///
/// `RUST_LOG` still wins when it is set. Returns false if a logger was
/// already installed.
pub fn init_with_level(level: &str) -> bool {
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env).try_init().is_ok()
}

/// Install `env_logger` using `config.log_level`
pub fn init_from_config(config: &EngineConfig) -> bool {
    let installed = init_with_level(&config.log_level);
    if installed {
        log::debug!("Logger installed at level '{}'", config.log_level);
    }
    installed
}
