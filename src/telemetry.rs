//! Tracing subscriber setup.
//!
//! Log verbosity follows `RUST_LOG` via `EnvFilter`, with an optional
//! default directive for when the variable is unset.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber.
///
/// Safe to call once per process; subsequent calls are no-ops (the global
/// subscriber can only be set once).
pub fn init_telemetry(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(filter),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_telemetry("info");
        init_telemetry("debug");
    }
}
