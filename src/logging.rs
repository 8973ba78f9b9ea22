//! Convenience logger setup for binaries and tests embedding this crate.
//!
//! The library itself only ever calls into the `log` facade
//! (`log::{error,warn,info,debug,trace}`); it never installs a logger. This
//! module is a small helper for programs that want a reasonable default:
//! plain `env_logger` output, bumped to `debug` whenever `XPS_DEBUG=1` is
//! set in the environment.

/// Installs `env_logger` as the global logger.
///
/// Honors `RUST_LOG` if set. Otherwise defaults to `info`, or to `debug`
/// when the `XPS_DEBUG` environment variable is set to `1`.
///
/// Calling this more than once is harmless; only the first call has an
/// effect.
pub fn init() {
    let default_level = if xps_debug_enabled() { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).try_init();
}

fn xps_debug_enabled() -> bool {
    std::env::var("XPS_DEBUG").map(|v| v == "1").unwrap_or(false)
}
