//! Per-request view handed to the protection engine
//!
//! Framework adapters fill this from their own request type.

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Request data the engine and custom predicates may inspect
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method
    pub method: Method,

    /// Request path, without the query string
    pub path: String,

    /// Decoded query parameters
    pub query: HashMap<String, String>,

    /// Decoded form fields, empty unless the body was a form
    pub form: HashMap<String, String>,

    /// Request headers
    pub headers: HeaderMap,
}

impl RequestContext {
    /// Create a context for a method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            form: HashMap::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a form field
    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Read a header as UTF-8 text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Whether the method changes server state
    pub fn is_state_changing(&self) -> bool {
        is_state_changing(&self.method)
    }
}

/// POST, PUT, PATCH and DELETE change state; every other method is treated as safe
pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
