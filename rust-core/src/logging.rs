//! Log output setup
//!
//! The library only emits `tracing` events; hosts call [`init_logging`]
//! once to print them.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a compact stderr subscriber
///
/// `RUST_LOG` wins over `default_directive` (e.g. `"zrlc_meter=debug"`).
///
/// # Returns
/// `false` if a global subscriber was already installed
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_thread_names(true))
        .try_init()
        .is_ok()
}
