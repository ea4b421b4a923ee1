//! Canonical route identity and template normalization.

use std::fmt;
use std::sync::Arc;

use http::Method;

/// Canonical `(method, template)` identity of a logical route.
///
/// Every concrete request path that matches a registered template resolves to
/// the same `RouteKey`, regardless of the captured parameter values. Policy
/// tables are keyed by `RouteKey`, never by raw paths.
///
/// # Example
///
/// ```rust
/// use gatehouse_router::RouteKey;
/// use http::Method;
///
/// let key = RouteKey::new(Method::GET, "/users/{id}");
/// assert_eq!(key.template(), "/users/:id");
/// assert_eq!(key.to_string(), "GET /users/:id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    method: Method,
    template: Arc<str>,
}

impl RouteKey {
    /// Creates a key, normalizing the template.
    #[must_use]
    pub fn new(method: Method, template: &str) -> Self {
        Self {
            method,
            template: Arc::from(normalize_template(template)),
        }
    }

    /// Creates a key from an already-normalized template.
    pub(crate) fn from_normalized(method: Method, template: Arc<str>) -> Self {
        Self { method, template }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the canonical template (parameters rendered as `:name`).
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

/// Normalizes a route template.
///
/// - guarantees a single leading `/`
/// - drops empty segments, so trailing and doubled slashes disappear
/// - rewrites `{name}` parameters to `:name`
///
/// ```rust
/// use gatehouse_router::normalize_template;
///
/// assert_eq!(normalize_template("users/{id}/"), "/users/:id");
/// assert_eq!(normalize_template(""), "/");
/// assert_eq!(normalize_template("//a//b"), "/a/b");
/// ```
#[must_use]
pub fn normalize_template(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                out.push(':');
                out.push_str(name);
            }
            None => out.push_str(segment),
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Joins a group prefix and a route path into one normalized template.
///
/// ```rust
/// use gatehouse_router::join_paths;
///
/// assert_eq!(join_paths("/api/", "/users"), "/api/users");
/// assert_eq!(join_paths("api", "/"), "/api");
/// assert_eq!(join_paths("", "{id}"), "/:id");
/// ```
#[must_use]
pub fn join_paths(prefix: &str, path: &str) -> String {
    normalize_template(&format!("{prefix}/{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize_template("health"), "/health");
    }

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(normalize_template("/users/"), "/users");
        assert_eq!(normalize_template("/"), "/");
    }

    #[test]
    fn test_normalize_converts_braces() {
        assert_eq!(
            normalize_template("/orgs/{orgId}/users/{userId}"),
            "/orgs/:orgId/users/:userId"
        );
    }

    #[test]
    fn test_normalize_keeps_colon_params() {
        assert_eq!(normalize_template("/users/:id"), "/users/:id");
    }

    #[test]
    fn test_join_paths_without_prefix() {
        assert_eq!(join_paths("", "/users"), "/users");
    }

    #[test]
    fn test_join_paths_root_route() {
        assert_eq!(join_paths("/admin", ""), "/admin");
        assert_eq!(join_paths("/admin", "/"), "/admin");
    }

    #[test]
    fn test_join_paths_nested() {
        assert_eq!(join_paths("/api/v1", "users/{id}"), "/api/v1/users/:id");
    }

    #[test]
    fn test_route_key_equality_after_normalization() {
        let a = RouteKey::new(Method::GET, "/users/{id}");
        let b = RouteKey::new(Method::GET, "users/:id/");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_route_key_method_distinguishes() {
        let get = RouteKey::new(Method::GET, "/users");
        let post = RouteKey::new(Method::POST, "/users");
        assert_ne!(get, post);
        assert_eq!(post.method(), &Method::POST);
    }

    #[test]
    fn test_route_key_display() {
        let key = RouteKey::new(Method::DELETE, "/users/:id");
        assert_eq!(key.to_string(), "DELETE /users/:id");
    }
}
