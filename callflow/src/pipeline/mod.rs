//! Pipeline building and execution.
//!
//! This module provides:
//! - Named phases with relative insertion
//! - Pipeline builder with registration-time validation
//! - Wrap-style interceptors with a `proceed` continuation
//! - The executor running one call through the frozen pipeline

mod builder;
mod executor;
mod interceptor;
mod phase;

pub use builder::PipelineBuilder;
pub use executor::Pipeline;
pub use interceptor::{BoxFuture, FnInterceptor, Interceptor, Next};
pub use phase::{PhaseGraph, PipelinePhase};
