//! # Callflow
//!
//! Request-processing building blocks for async services.
//!
//! Callflow provides:
//!
//! - **Phased pipelines**: named phases ordered by relative insertion, each
//!   holding wrap-style interceptors that continue with `proceed`
//! - **Call context**: request and response metadata, a write-once attribute
//!   bag, diagnostic tags and a cancellation token per call
//! - **Diagnostic propagation**: per-call tags that follow a task across
//!   worker threads
//! - **Callback bridge**: turns a callback-style operation into a future that
//!   resolves exactly once and cancels the producer when abandoned
//! - **Plugins**: correlation ids and call logging, installed on an
//!   application with lifecycle events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use callflow::prelude::*;
//!
//! let mut builder = ApplicationBuilder::new("orders");
//! builder
//!     .install(CallId::new(CallIdConfig::new().header("X-Request-Id").generate_default(32)))?
//!     .install(CallLogging::new(CallLoggingConfig::new().call_id_mdc("call_id")))?;
//! builder.intercept(&PipelinePhase::CALL, OrdersHandler::new())?;
//!
//! let app = builder.build()?;
//! app.start();
//! app.handle(&mut call).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod application;
pub mod bridge;
pub mod cancellation;
pub mod context;
pub mod cookies;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod testing;

pub use application::{Application, ApplicationBuilder, ApplicationConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::application::{Application, ApplicationBuilder, ApplicationConfig};
    pub use crate::bridge::{
        submit, BridgeError, CallbackTransport, CancelHandle, Completion, LatchState,
        PendingCall,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{
        Attributes, CallContext, RequestMeta, ResponseMeta, CALL_ID_ATTRIBUTE,
    };
    pub use crate::diagnostics::{with_diagnostics, DiagnosticScope, DiagnosticTags};
    pub use crate::errors::{
        CallResult, CallflowError, CancelReason, DataConflictError, PipelineConfigError,
    };
    pub use crate::events::{LifecycleEvent, LifecycleEvents, SubscriptionId};
    pub use crate::pipeline::{
        BoxFuture, Interceptor, Next, Pipeline, PipelineBuilder, PipelinePhase,
    };
    pub use crate::plugins::{
        CallId, CallIdConfig, CallLogging, CallLoggingConfig, Plugin, TextGeneratorConfig,
    };
}
