//! Declarative route and group security declarations.

use gatehouse_core::{GatehouseError, GatehouseResult};
use gatehouse_router::join_paths;
use http::Method;

/// Security settings for one path under one or more methods.
///
/// # Example
///
/// ```rust
/// use gatehouse_policy::RouteSpec;
/// use http::Method;
///
/// let spec = RouteSpec::new(Method::GET, "/users/:id")
///     .method(Method::PUT)
///     .schemes(["jwt"])
///     .policies(["owner"])
///     .limiters(["per-client"]);
/// assert_eq!(spec.methods().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
    methods: Vec<Method>,
    path: String,
    schemes: Vec<String>,
    policies: Vec<String>,
    limiters: Vec<String>,
    allow_anonymous: bool,
}

impl RouteSpec {
    /// Declares `path` for a single method.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            methods: vec![method],
            path: path.into(),
            ..Self::default()
        }
    }

    /// Declares `path` for several methods at once.
    #[must_use]
    pub fn with_methods(methods: impl IntoIterator<Item = Method>, path: impl Into<String>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Appends authentication schemes.
    #[must_use]
    pub fn schemes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends authorization policies.
    #[must_use]
    pub fn policies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends rate limiters.
    #[must_use]
    pub fn limiters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.limiters.extend(names.into_iter().map(Into::into));
        self
    }

    /// Exempts the route from authentication.
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Declared methods.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Declared path, as written.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared schemes.
    #[must_use]
    pub fn scheme_names(&self) -> &[String] {
        &self.schemes
    }

    /// Declared policies.
    #[must_use]
    pub fn policy_names(&self) -> &[String] {
        &self.policies
    }

    /// Declared limiters.
    #[must_use]
    pub fn limiter_names(&self) -> &[String] {
        &self.limiters
    }

    /// Whether the route is allow-anonymous.
    #[must_use]
    pub fn is_allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub(crate) fn validate(&self) -> GatehouseResult<()> {
        if self.path.trim().is_empty() {
            return Err(GatehouseError::invalid_declaration("route path must not be empty"));
        }
        if self.methods.is_empty() {
            return Err(GatehouseError::invalid_declaration(format!(
                "route '{}' declares no methods",
                self.path
            )));
        }
        for name in self.schemes.iter().chain(&self.policies).chain(&self.limiters) {
            if name.trim().is_empty() {
                return Err(GatehouseError::invalid_declaration(format!(
                    "route '{}' references an empty policy name",
                    self.path
                )));
            }
        }
        Ok(())
    }

    /// Applies group settings: prefix joined onto the path, group names
    /// ahead of the route's own, allow-anonymous if either sets it.
    pub(crate) fn inherit(self, group: &GroupSpec) -> Self {
        fn merged(first: &[String], then: Vec<String>) -> Vec<String> {
            let mut out = first.to_vec();
            out.extend(then);
            out
        }

        Self {
            methods: self.methods,
            path: join_paths(&group.prefix, &self.path),
            schemes: merged(&group.schemes, self.schemes),
            policies: merged(&group.policies, self.policies),
            limiters: merged(&group.limiters, self.limiters),
            allow_anonymous: self.allow_anonymous || group.allow_anonymous,
        }
    }
}

/// Routes sharing a path prefix and security settings.
///
/// ```rust
/// use gatehouse_policy::{GroupSpec, RouteSpec};
/// use http::Method;
///
/// let admin = GroupSpec::new("/admin")
///     .schemes(["jwt"])
///     .policies(["admin"])
///     .route(RouteSpec::new(Method::GET, "/users"))
///     .route(RouteSpec::new(Method::DELETE, "/users/:id"));
/// assert_eq!(admin.routes().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSpec {
    prefix: String,
    schemes: Vec<String>,
    policies: Vec<String>,
    limiters: Vec<String>,
    allow_anonymous: bool,
    routes: Vec<RouteSpec>,
}

impl GroupSpec {
    /// Creates a group under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Appends group-level schemes.
    #[must_use]
    pub fn schemes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends group-level policies.
    #[must_use]
    pub fn policies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Appends group-level limiters.
    #[must_use]
    pub fn limiters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.limiters.extend(names.into_iter().map(Into::into));
        self
    }

    /// Makes every route in the group allow-anonymous.
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Adds a route.
    #[must_use]
    pub fn route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Group prefix, as written.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Routes in declaration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    /// Routes with the group's settings applied.
    pub(crate) fn into_routes(self) -> GatehouseResult<Vec<RouteSpec>> {
        if self.routes.is_empty() {
            return Err(GatehouseError::invalid_declaration(format!(
                "group '{}' declares no routes",
                self.prefix
            )));
        }
        let routes = self.routes.clone();
        Ok(routes.into_iter().map(|route| route.inherit(&self)).collect())
    }
}
