//! Logging setup for embedders and tests.

use env_logger::{Builder, Env};

/// Installs `env_logger` as the `log` backend. `RUST_LOG` wins over the
/// default level. Calling this more than once is harmless.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let _ = Builder::from_env(Env::default().default_filter_or(default_level)).try_init();
}
