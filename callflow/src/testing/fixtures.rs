//! Test fixtures for building calls.

use http::{Method, Uri};

use crate::context::{CallContext, RequestMeta};

/// A call context builder.
#[derive(Debug, Clone)]
pub struct TestCall {
    method: Method,
    uri: Uri,
    headers: Vec<(String, String)>,
}

impl TestCall {
    /// Starts a `GET` for `uri`.
    #[must_use]
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Starts a request with the given method.
    #[must_use]
    pub fn new(method: Method, uri: &'static str) -> Self {
        Self {
            method,
            uri: Uri::from_static(uri),
            headers: Vec::new(),
        }
    }

    /// Replaces the target with a runtime-built `uri`.
    #[must_use]
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builds the call context.
    #[must_use]
    pub fn build(&self) -> CallContext {
        let request = self
            .headers
            .iter()
            .fold(RequestMeta::new(self.method.clone(), self.uri.clone()), |req, (k, v)| {
                req.with_header(k, v)
            });
        CallContext::new(request)
    }
}
