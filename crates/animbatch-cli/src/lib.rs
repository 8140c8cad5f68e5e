//! animbatch CLI library.
//!
//! Command implementations for the `animbatch` binary, plus logger setup.

pub mod commands;

/// Initializes `env_logger`.
///
/// The default filter is `warn`; one `-v` raises it to `info`, two or more to
/// `debug`. `RUST_LOG` wins over both.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
