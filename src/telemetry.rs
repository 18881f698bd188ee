//! Logging bootstrap.
//!
//! The library only emits `tracing` events; embedding applications and
//! tests decide where they go. [`init_tracing`] is a convenience for
//! binaries and examples: it honours `RUST_LOG` and falls back to `info`.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "u_portsim=info";

/// Installs a global fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Like [`init_tracing`] with an explicit fallback directive.
pub fn init_tracing_with(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing_with("u_portsim=debug");
        init_tracing();
        tracing::info!("telemetry ready");
    }
}
