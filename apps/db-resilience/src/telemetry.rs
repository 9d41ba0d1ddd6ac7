//! Tracing setup.
//!
//! Console subscriber with `EnvFilter`; verbosity is driven by `RUST_LOG`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use db_resilience::telemetry::init_tracing;
//!
//! fn main() {
//!     init_tracing();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize the console tracing subscriber.
///
/// Safe to call once per process; a second call is a no-op so tests can
/// initialize independently.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
