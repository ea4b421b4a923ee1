//! The built, read-only security policy.

use gatehouse_core::{PolicyKind, RouteKey};
use gatehouse_router::RouteRegistry;
use http::Method;
use serde::{Deserialize, Serialize};

use crate::tables::PolicyTables;

/// Global fallback names, each optional.
///
/// A default applies only to routes whose association table has no entry
/// of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalDefaults {
    /// Default authentication scheme.
    pub scheme: Option<String>,
    /// Default authorization policy.
    pub policy: Option<String>,
    /// Default rate limiter.
    pub limiter: Option<String>,
}

impl GlobalDefaults {
    /// The default name for `kind`, ignoring blank names.
    #[must_use]
    pub fn get(&self, kind: PolicyKind) -> Option<&str> {
        let name = match kind {
            PolicyKind::Scheme => &self.scheme,
            PolicyKind::Policy => &self.policy,
            PolicyKind::Limiter => &self.limiter,
        };
        name.as_deref().filter(|name| !name.trim().is_empty())
    }
}

/// Route registry, association tables and defaults, frozen after build.
///
/// Lookups take a concrete `(method, path)`, resolve it to its template's
/// [`RouteKey`] and answer from the tables. A path matching no template
/// has no configuration and gets the defaults.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    registry: RouteRegistry,
    tables: PolicyTables,
    defaults: GlobalDefaults,
}

impl SecurityPolicy {
    pub(crate) fn new(registry: RouteRegistry, tables: PolicyTables, defaults: GlobalDefaults) -> Self {
        Self {
            registry,
            tables,
            defaults,
        }
    }

    /// Resolves a concrete request to its route key.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteKey> {
        self.registry.resolve(method, path)
    }

    /// Authentication schemes for a request, in evaluation order.
    ///
    /// Falls back to `[default scheme]`, or `[]` without one.
    #[must_use]
    pub fn schemes_for(&self, method: &Method, path: &str) -> Vec<&str> {
        self.names_for_key(PolicyKind::Scheme, self.resolve(method, path).as_ref())
    }

    /// Authorization policies for a request, in evaluation order.
    ///
    /// An empty list means authentication alone suffices.
    #[must_use]
    pub fn policies_for(&self, method: &Method, path: &str) -> Vec<&str> {
        self.names_for_key(PolicyKind::Policy, self.resolve(method, path).as_ref())
    }

    /// Rate limiters for a request, in acquisition order.
    #[must_use]
    pub fn limiters_for(&self, method: &Method, path: &str) -> Vec<&str> {
        self.names_for_key(PolicyKind::Limiter, self.resolve(method, path).as_ref())
    }

    /// Returns true if the request's route is allow-anonymous.
    #[must_use]
    pub fn is_allow_anonymous(&self, method: &Method, path: &str) -> bool {
        self.resolve(method, path)
            .is_some_and(|key| self.tables.is_anonymous(&key))
    }

    /// Names of `kind` for an already-resolved key, with default fallback.
    #[must_use]
    pub fn names_for_key(&self, kind: PolicyKind, key: Option<&RouteKey>) -> Vec<&str> {
        match key.and_then(|key| self.tables.names(kind, key)) {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.defaults.get(kind).into_iter().collect(),
        }
    }

    /// Returns true if `key` is allow-anonymous.
    #[must_use]
    pub fn is_anonymous_key(&self, key: &RouteKey) -> bool {
        self.tables.is_anonymous(key)
    }

    /// Routes explicitly bound to scheme `name`.
    #[must_use]
    pub fn routes_for_scheme(&self, name: &str) -> Vec<RouteKey> {
        self.tables.routes_referencing(PolicyKind::Scheme, name)
    }

    /// Routes explicitly bound to policy `name`.
    #[must_use]
    pub fn routes_for_policy(&self, name: &str) -> Vec<RouteKey> {
        self.tables.routes_referencing(PolicyKind::Policy, name)
    }

    /// Routes explicitly bound to limiter `name`.
    #[must_use]
    pub fn routes_for_limiter(&self, name: &str) -> Vec<RouteKey> {
        self.tables.routes_referencing(PolicyKind::Limiter, name)
    }

    /// Allow-anonymous routes.
    pub fn anonymous_routes(&self) -> impl Iterator<Item = &RouteKey> {
        self.tables.anonymous()
    }

    /// Every registered route.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteKey> {
        self.registry.routes()
    }

    /// The route registry.
    #[must_use]
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Global defaults.
    #[must_use]
    pub fn defaults(&self) -> &GlobalDefaults {
        &self.defaults
    }

    pub(crate) fn tables(&self) -> &PolicyTables {
        &self.tables
    }
}
