//! Testing utilities for callflow pipelines.
//!
//! This module provides:
//! - Mock interceptors that record, wrap, stop, fail or stall
//! - A call builder for request fixtures
//! - A scripted callback transport for exercising the bridge

mod fixtures;
mod mocks;
mod transport;

pub use fixtures::TestCall;
pub use mocks::{
    FailingInterceptor, MarkerInterceptor, MarkerLog, ShortCircuitInterceptor, SlowInterceptor,
    WrapInterceptor,
};
pub use transport::ScriptedTransport;
