//! Request and response metadata carried by a call.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};

/// Metadata of the incoming request.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestMeta {
    /// Creates request metadata for `method` and `uri` with no headers.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
        }
    }

    /// Adds a header. Invalid names or values are ignored with a warning.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid request header"),
        }
        self
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup; values that are not visible ASCII are skipped.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A short description suitable for log lines: `GET - /path`.
    #[must_use]
    pub fn to_log_string(&self) -> String {
        format!("{} - {}", self.method, self.path())
    }
}

/// Metadata of the outgoing response, filled in by interceptors.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

impl ResponseMeta {
    /// Creates empty response metadata; no status means "unhandled".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The response status, if any interceptor set one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a response header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not valid in HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> anyhow::Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }
}
