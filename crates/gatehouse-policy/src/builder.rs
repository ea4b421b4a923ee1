//! Configuration-time builder for [`SecurityPolicy`].

use gatehouse_core::{GatehouseError, GatehouseResult, PolicyKind, RouteKey};
use gatehouse_router::RouteRegistry;
use tracing::{debug, info};

use crate::declaration::{GroupSpec, RouteSpec};
use crate::policy::{GlobalDefaults, SecurityPolicy};
use crate::tables::PolicyTables;

/// Accumulates route registrations and policy associations.
///
/// Every method fails fast: a conflict leaves the builder unusable for
/// serving and the error should stop startup. Routes are registered in the
/// route registry as a side effect of any association, so a route named
/// only in `add_rate_limit_policies` still resolves.
///
/// # Example
///
/// ```rust
/// use gatehouse_core::RouteKey;
/// use gatehouse_policy::{RouteSpec, SecurityPolicyBuilder};
/// use http::Method;
///
/// # fn main() -> gatehouse_core::GatehouseResult<()> {
/// let mut builder = SecurityPolicyBuilder::new();
/// builder
///     .default_scheme("jwt")
///     .route(RouteSpec::new(Method::GET, "/health").allow_anonymous())?
///     .add_authorization_policies(&[RouteKey::new(Method::DELETE, "/users/:id")], ["admin"])?;
///
/// let policy = builder.build();
/// assert!(policy.is_allow_anonymous(&Method::GET, "/health"));
/// assert_eq!(policy.schemes_for(&Method::DELETE, "/users/7"), vec!["jwt"]);
/// assert_eq!(policy.policies_for(&Method::DELETE, "/users/7"), vec!["admin"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SecurityPolicyBuilder {
    registry: RouteRegistry,
    tables: PolicyTables,
    defaults: GlobalDefaults,
}

impl SecurityPolicyBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RouteRegistry::new(),
            tables: PolicyTables::default(),
            defaults: GlobalDefaults::default(),
        }
    }

    /// Binds authentication schemes to `routes`, in the given order.
    ///
    /// Fails if any route is allow-anonymous.
    pub fn add_authentication_schemes<I, S>(&mut self, routes: &[RouteKey], schemes: I) -> GatehouseResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associate(PolicyKind::Scheme, routes, collect_names(schemes))
    }

    /// Binds authorization policies to `routes`, in the given order.
    pub fn add_authorization_policies<I, S>(&mut self, routes: &[RouteKey], policies: I) -> GatehouseResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associate(PolicyKind::Policy, routes, collect_names(policies))
    }

    /// Binds rate limiters to `routes`, in the given order.
    pub fn add_rate_limit_policies<I, S>(&mut self, routes: &[RouteKey], limiters: I) -> GatehouseResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associate(PolicyKind::Limiter, routes, collect_names(limiters))
    }

    /// Exempts `routes` from authentication.
    ///
    /// Fails if a route already has schemes or is already marked.
    pub fn mark_allow_anonymous(&mut self, routes: &[RouteKey]) -> GatehouseResult<&mut Self> {
        if routes.is_empty() {
            return Err(GatehouseError::invalid_declaration(
                "allow-anonymous requires at least one route",
            ));
        }
        for route in routes {
            let key = self.register(route)?;
            self.tables.mark_anonymous(&key)?;
            debug!(route = %key, "route marked allow-anonymous");
        }
        Ok(self)
    }

    /// Applies a route declaration for each of its methods.
    pub fn route(&mut self, spec: RouteSpec) -> GatehouseResult<&mut Self> {
        spec.validate()?;
        for method in spec.methods() {
            let (key, _) = self.registry.register(method, spec.path())?;
            if spec.is_allow_anonymous() {
                self.tables.mark_anonymous(&key)?;
            }
            for (kind, names) in [
                (PolicyKind::Scheme, spec.scheme_names()),
                (PolicyKind::Policy, spec.policy_names()),
                (PolicyKind::Limiter, spec.limiter_names()),
            ] {
                if !names.is_empty() {
                    self.tables.merge(kind, &key, names)?;
                }
            }
            debug!(route = %key, "route declared");
        }
        Ok(self)
    }

    /// Applies every route of a group with the group's settings inherited.
    pub fn group(&mut self, group: GroupSpec) -> GatehouseResult<&mut Self> {
        for route in group.into_routes()? {
            self.route(route)?;
        }
        Ok(self)
    }

    /// Replaces all global defaults.
    pub fn defaults(&mut self, defaults: GlobalDefaults) -> &mut Self {
        self.defaults = defaults;
        self
    }

    /// Sets the default authentication scheme.
    pub fn default_scheme(&mut self, name: impl Into<String>) -> &mut Self {
        self.defaults.scheme = Some(name.into());
        self
    }

    /// Sets the default authorization policy.
    pub fn default_policy(&mut self, name: impl Into<String>) -> &mut Self {
        self.defaults.policy = Some(name.into());
        self
    }

    /// Sets the default rate limiter.
    pub fn default_limiter(&mut self, name: impl Into<String>) -> &mut Self {
        self.defaults.limiter = Some(name.into());
        self
    }

    /// Freezes the builder into a read-only policy.
    #[must_use]
    pub fn build(self) -> SecurityPolicy {
        info!(
            routes = self.registry.len(),
            authenticated = self.tables.configured_routes(PolicyKind::Scheme),
            authorized = self.tables.configured_routes(PolicyKind::Policy),
            rate_limited = self.tables.configured_routes(PolicyKind::Limiter),
            anonymous = self.tables.anonymous().count(),
            "security policy built"
        );
        SecurityPolicy::new(self.registry, self.tables, self.defaults)
    }

    fn associate(&mut self, kind: PolicyKind, routes: &[RouteKey], names: Vec<String>) -> GatehouseResult<&mut Self> {
        if routes.is_empty() {
            return Err(GatehouseError::invalid_declaration(format!(
                "{kind} association requires at least one route"
            )));
        }
        if names.is_empty() {
            return Err(GatehouseError::invalid_declaration(format!(
                "{kind} association requires at least one name"
            )));
        }
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(GatehouseError::invalid_declaration(format!("{kind} name must not be empty")));
        }

        for route in routes {
            let key = self.register(route)?;
            self.tables.merge(kind, &key, &names)?;
        }
        Ok(self)
    }

    fn register(&mut self, route: &RouteKey) -> GatehouseResult<RouteKey> {
        let (key, _) = self.registry.register(route.method(), route.template())?;
        Ok(key)
    }
}

fn collect_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
