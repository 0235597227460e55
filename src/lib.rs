// hostfacts library - public API

// Re-export error types
pub mod error;
pub use error::{HostFactsError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;
pub mod ui;

// Re-export commonly used types
pub use core::config::Config;

/// Initialize logging. `RUST_LOG` wins over the default level; `verbose`
/// raises the default from warn to debug.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .init();
}
