//! Per-invocation state flowing through a pipeline traversal.

use super::{Attributes, RequestMeta, ResponseMeta};
use crate::cancellation::CancellationToken;
use crate::diagnostics::DiagnosticTags;
use crate::errors::CancelReason;
use std::sync::Arc;
use tracing::Span;

/// Attribute key under which the resolved correlation id is stored.
pub const CALL_ID_ATTRIBUTE: &str = "callflow.call_id";

/// The state of one call.
///
/// A context is threaded through the interceptor chain as `&mut`, so at most
/// one interceptor touches it at a time. Independent calls own independent
/// contexts.
#[derive(Debug)]
pub struct CallContext {
    /// Request metadata.
    pub request: RequestMeta,
    /// Response metadata.
    pub response: ResponseMeta,
    /// String-keyed attribute bag.
    pub attributes: Attributes,
    /// Diagnostic tags attached to this call.
    pub diagnostics: DiagnosticTags,
    cancellation: Arc<CancellationToken>,
    span: Span,
}

impl CallContext {
    /// Creates a context for `request` with an empty response.
    #[must_use]
    pub fn new(request: RequestMeta) -> Self {
        let span = tracing::info_span!(
            "call",
            method = %request.method(),
            path = %request.path(),
            call_id = tracing::field::Empty,
        );

        Self {
            request,
            response: ResponseMeta::new(),
            attributes: Attributes::new(),
            diagnostics: DiagnosticTags::new(),
            cancellation: Arc::new(CancellationToken::new()),
            span,
        }
    }

    /// Shares an externally owned cancellation token with this call.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// The call's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Requests cancellation of this call.
    pub fn cancel(&self, reason: impl Into<CancelReason>) {
        self.cancellation.cancel(reason);
    }

    /// Returns whether the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The tracing span covering this call's traversal.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The resolved correlation id, if one was attached.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        self.attributes.get_str(CALL_ID_ATTRIBUTE)
    }
}
