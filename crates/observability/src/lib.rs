//! Process-wide tracing setup shared by Warden binaries and tests.

/// Install the global subscriber with the default settings.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(&tracing::TracingConfig::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
