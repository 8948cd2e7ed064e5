//! Log output setup.
//!
//! Library code only emits `tracing` events; binaries and tests decide where
//! they go by installing a subscriber here.

mod subscriber;

pub use subscriber::{init_tracing, try_init_tracing, TracingConfig, DEFAULT_LOG_FILTER};
