//! Borrowed view of an inbound request.
//!
//! The engine never owns request bodies. Authentication handlers receive a
//! [`RequestView`] exposing the method, URI, headers and the client key the
//! HTTP layer derived for rate limiting.

use http::{HeaderMap, Method, Uri};

/// Read-only view of the parts of a request the engine needs.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
    client_key: Option<&'a str>,
}

impl<'a> RequestView<'a> {
    /// Creates a view from individual parts.
    #[must_use]
    pub const fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            client_key: None,
        }
    }

    /// Creates a view over an `http::Request`.
    #[must_use]
    pub fn from_request<B>(request: &'a http::Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }

    /// Creates a view over request parts.
    #[must_use]
    pub const fn from_parts(parts: &'a http::request::Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }

    /// Attaches the client key used for rate limiting.
    #[must_use]
    pub const fn with_client_key(mut self, client_key: &'a str) -> Self {
        self.client_key = Some(client_key);
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &'a Method {
        self.method
    }

    /// Full request URI.
    #[must_use]
    pub const fn uri(&self) -> &'a Uri {
        self.uri
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Returns a header value if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the token of an `Authorization: Bearer <token>` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&'a str> {
        let value = self.header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|t| !t.is_empty())
    }

    /// Client key attached by the HTTP layer.
    #[must_use]
    pub const fn client_key(&self) -> Option<&'a str> {
        self.client_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_request() {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/users/1?expand=true")
            .header("x-api-key", "k1")
            .body(())
            .unwrap();

        let view = RequestView::from_request(&request).with_client_key("10.0.0.1");
        assert_eq!(view.method(), &Method::POST);
        assert_eq!(view.path(), "/users/1");
        assert_eq!(view.header("x-api-key"), Some("k1"));
        assert_eq!(view.header("missing"), None);
        assert_eq!(view.client_key(), Some("10.0.0.1"));
    }

    #[test]
    fn test_bearer_token() {
        let request = http::Request::builder()
            .uri("/")
            .header("authorization", "Bearer abc.def")
            .body(())
            .unwrap();
        assert_eq!(RequestView::from_request(&request).bearer_token(), Some("abc.def"));

        let basic = http::Request::builder()
            .uri("/")
            .header("authorization", "Basic dXNlcg==")
            .body(())
            .unwrap();
        assert_eq!(RequestView::from_request(&basic).bearer_token(), None);
    }
}
