//! Call context management.
//!
//! This module provides:
//! - Request and response metadata
//! - A write-once attribute bag
//! - The per-call context threaded through the pipeline

mod bags;
mod call;
mod request;

pub use bags::Attributes;
pub use call::{CallContext, CALL_ID_ATTRIBUTE};
pub use request::{RequestMeta, ResponseMeta};
