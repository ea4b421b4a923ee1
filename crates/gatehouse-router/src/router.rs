//! The route registry.
//!
//! [`RouteRegistry`] stores templates per method and resolves concrete
//! `(method, path)` pairs back to the canonical [`RouteKey`] they match.

use std::sync::Arc;

use http::Method;

use crate::error::RouteError;
use crate::key::{normalize_template, RouteKey};
use crate::node::{parse_template, Node};
use crate::params::Params;
use crate::RouteMatch;

/// Registry of route templates keyed by method.
///
/// # Example
///
/// ```rust
/// use gatehouse_router::RouteRegistry;
/// use http::Method;
///
/// let mut registry = RouteRegistry::new();
/// registry.register(&Method::GET, "/user/{id}").unwrap();
///
/// let a = registry.resolve(&Method::GET, "/user/77").unwrap();
/// let b = registry.resolve(&Method::GET, "/user/12345").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "GET /user/:id");
/// ```
///
/// # Route Priority
///
/// When more than one template could match a path, a static segment always
/// wins over a parameter segment at the same depth. `/user/new` therefore
/// resolves to the `/user/new` template even when `/user/:id` is also
/// registered for the same method.
///
/// Priority is applied per segment and respects the method: if the static
/// branch dead-ends, or its leaf has nothing registered for the request
/// method, the parameter branch is tried instead.
///
/// # Path handling
///
/// Paths are split on `/` and empty segments are ignored, so `/users/` and
/// `/users` resolve identically. A query string, if present, is ignored.
/// Matching is case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    root: Node,
    route_count: usize,
}

impl RouteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::new(""),
            route_count: 0,
        }
    }

    /// Registers `template` for `method`.
    ///
    /// Templates use `:name` or `{name}` parameter segments and are normalized
    /// before storage. Returns the canonical key and whether it was newly
    /// added; registering the same pair again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for malformed templates, or
    /// [`RouteError::Conflict`] when the same method already holds a
    /// structurally identical template with different parameter names.
    pub fn register(&mut self, method: &Method, template: &str) -> Result<(RouteKey, bool), RouteError> {
        if template.trim().is_empty() {
            return Err(RouteError::EmptyPath);
        }

        let normalized: Arc<str> = Arc::from(normalize_template(template));
        let segments = parse_template(&normalized)?;
        let added = self.root.insert(&segments, method, &normalized)?;
        if added {
            self.route_count += 1;
        }
        Ok((RouteKey::from_normalized(method.clone(), normalized), added))
    }

    /// Resolves a concrete path to the key of the template it matches.
    ///
    /// `None` means no template matched; callers treat that as "no policy
    /// configured", not as an error.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteKey> {
        let segments = split_path(path);
        self.root
            .find(&segments, method)
            .map(|template| RouteKey::from_normalized(method.clone(), Arc::clone(template)))
    }

    /// Resolves a concrete path and also returns the captured parameters.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let key = self.resolve(method, path)?;
        let params = Params::from_match(key.template(), strip_query(path));
        Some(RouteMatch { key, params })
    }

    /// Lists the methods registered for any template matching `path`.
    ///
    /// Useful for building `405 Method Not Allowed` responses.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let segments = split_path(path);
        let mut methods = Vec::new();
        self.root.collect_methods(&segments, &mut methods);
        methods
    }

    /// Returns true if `key` was registered.
    #[must_use]
    pub fn contains(&self, key: &RouteKey) -> bool {
        self.resolve(key.method(), key.template())
            .is_some_and(|found| found == *key)
    }

    /// Returns every registered key, static branches before parameter branches.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteKey> {
        let mut out = Vec::with_capacity(self.route_count);
        self.root.collect_routes(&mut out);
        out
    }

    /// Number of registered `(method, template)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}

fn split_path(path: &str) -> Vec<&str> {
    strip_query(path).split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new() {
        let registry = RouteRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_returns_key() {
        let mut registry = RouteRegistry::new();
        let (key, added) = registry.register(&Method::GET, "/users/{id}").unwrap();
        assert!(added);
        assert_eq!(key, RouteKey::new(Method::GET, "/users/:id"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_idempotent() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users/:id").unwrap();
        let (_, added) = registry.register(&Method::GET, "/users/{id}").unwrap();
        assert!(!added);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.routes().len(), 1);
    }

    #[test]
    fn test_register_empty_path() {
        let mut registry = RouteRegistry::new();
        assert_eq!(registry.register(&Method::GET, "  "), Err(RouteError::EmptyPath));
    }

    #[test]
    fn test_register_conflicting_param_names() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users/:id").unwrap();
        let err = registry.register(&Method::GET, "/users/:userId").unwrap_err();
        assert!(matches!(err, RouteError::Conflict { .. }));
    }

    #[test]
    fn test_param_names_may_differ_across_methods() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users/:id").unwrap();
        registry.register(&Method::DELETE, "/users/:userId").unwrap();

        let key = registry.resolve(&Method::DELETE, "/users/5").unwrap();
        assert_eq!(key.template(), "/users/:userId");
    }

    #[test]
    fn test_resolve_canonicalizes() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/user/:id").unwrap();

        let a = registry.resolve(&Method::GET, "/user/77").unwrap();
        let b = registry.resolve(&Method::GET, "/user/12345").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, RouteKey::new(Method::GET, "/user/:id"));
    }

    #[test]
    fn test_resolve_static_beats_param() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/user/:id").unwrap();
        registry.register(&Method::GET, "/user/new").unwrap();

        assert_eq!(
            registry.resolve(&Method::GET, "/user/new").unwrap().template(),
            "/user/new"
        );
        assert_eq!(
            registry.resolve(&Method::GET, "/user/old").unwrap().template(),
            "/user/:id"
        );
    }

    #[test]
    fn test_resolve_method_mismatch() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users").unwrap();
        assert!(registry.resolve(&Method::POST, "/users").is_none());
        assert_eq!(registry.allowed_methods("/users"), vec![Method::GET]);
    }

    #[test]
    fn test_resolve_not_found() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users").unwrap();
        assert!(registry.resolve(&Method::GET, "/posts").is_none());
        assert!(registry.resolve(&Method::GET, "/users/1").is_none());
        assert!(registry.allowed_methods("/posts").is_empty());
    }

    #[test]
    fn test_resolve_root() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/").unwrap();
        assert_eq!(registry.resolve(&Method::GET, "/").unwrap().template(), "/");
        assert_eq!(registry.resolve(&Method::GET, "").unwrap().template(), "/");
    }

    #[test]
    fn test_resolve_ignores_query_and_trailing_slash() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/search").unwrap();
        assert!(registry.resolve(&Method::GET, "/search/?q=rust").is_some());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/Users").unwrap();
        assert!(registry.resolve(&Method::GET, "/users").is_none());
    }

    #[test]
    fn test_match_route_params() {
        let mut registry = RouteRegistry::new();
        registry
            .register(&Method::GET, "/orgs/{org}/repos/{repo}")
            .unwrap();

        let matched = registry
            .match_route(&Method::GET, "/orgs/acme/repos/gatehouse?tab=1")
            .unwrap();
        assert_eq!(matched.key.template(), "/orgs/:org/repos/:repo");
        assert_eq!(matched.params.get("org"), Some("acme"));
        assert_eq!(matched.params.get("repo"), Some("gatehouse"));
    }

    #[test]
    fn test_contains() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/users/:id").unwrap();
        registry.register(&Method::GET, "/users/me").unwrap();

        assert!(registry.contains(&RouteKey::new(Method::GET, "/users/:id")));
        assert!(registry.contains(&RouteKey::new(Method::GET, "/users/me")));
        assert!(!registry.contains(&RouteKey::new(Method::POST, "/users/:id")));
        assert!(!registry.contains(&RouteKey::new(Method::GET, "/users/:uid")));
    }

    #[test]
    fn test_routes_lists_everything() {
        let mut registry = RouteRegistry::new();
        registry.register(&Method::GET, "/a").unwrap();
        registry.register(&Method::POST, "/a").unwrap();
        registry.register(&Method::GET, "/a/:id").unwrap();

        let routes = registry.routes();
        assert_eq!(routes.len(), 3);
        assert!(routes.contains(&RouteKey::new(Method::POST, "/a")));
    }
}
