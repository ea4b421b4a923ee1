//! Assembly of a running engine from a loaded [`GatehouseConfig`].

use std::fmt;
use std::sync::Arc;

use gatehouse_config::{ConfigLoader, GatehouseConfig};
use gatehouse_core::{GatehouseError, GatehouseResult};
use gatehouse_middleware::{Pipeline, PipelineBuilder};
use gatehouse_policy::{
    AuthenticationSchemes, AuthorizationPolicies, GroupSpec, RouteSpec, SecurityPolicyBuilder, SecurityProvider,
    SecurityResolver,
};
use gatehouse_ratelimit::{spawn_sweeper, BackgroundTask, LimiterRegistry};
use tracing::{info, warn};

/// Installs logging and metrics from the `telemetry` section of `config`.
///
/// Call once, early, before [`GatehouseBuilder::build`], so the build
/// summary and reference audit are logged.
pub fn init_telemetry(config: &GatehouseConfig) -> GatehouseResult<()> {
    gatehouse_telemetry::init_telemetry(&config.telemetry)
        .map_err(|err| GatehouseError::internal_with_source("failed to initialize telemetry", err))
}

/// A configured engine: the resolver plus its background sweeper.
pub struct Gatehouse {
    resolver: Arc<SecurityResolver>,
    sweeper: Option<BackgroundTask>,
}

impl Gatehouse {
    /// Starts building from `config`.
    pub fn builder(config: GatehouseConfig) -> GatehouseBuilder {
        GatehouseBuilder::new(config)
    }

    /// Loads configuration through `loader` and starts building from it.
    pub fn from_loader(loader: ConfigLoader) -> GatehouseResult<GatehouseBuilder> {
        let config = loader
            .load()
            .map_err(|err| GatehouseError::invalid_configuration("failed to load configuration", err))?;
        Ok(GatehouseBuilder::new(config))
    }

    /// The request-time resolver.
    pub fn resolver(&self) -> &Arc<SecurityResolver> {
        &self.resolver
    }

    /// The resolver as the interface adapters depend on.
    pub fn provider(&self) -> Arc<dyn SecurityProvider> {
        self.resolver.clone()
    }

    /// A middleware pipeline with the default stage settings.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.provider())
    }

    /// A pipeline builder for customizing the stages.
    pub fn pipeline_builder(&self) -> PipelineBuilder {
        Pipeline::builder(self.provider())
    }

    /// Whether the idle key sweeper is running.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(self) {
        if let Some(sweeper) = self.sweeper {
            sweeper.shutdown().await;
        }
    }
}

impl fmt::Debug for Gatehouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gatehouse")
            .field("routes", &self.resolver.policy().routes().len())
            .field("limiters", &self.resolver.limiters().len())
            .field("sweeper", &self.sweeper.is_some())
            .finish()
    }
}

/// Combines configuration with the handlers only code can supply.
///
/// Scheme handlers and policy predicates are code, so they are passed in;
/// everything else comes from the configuration. Routes and limiters
/// declared here are added after the configured ones.
///
/// # Example
///
/// ```
/// use gatehouse::{Gatehouse, GatehouseConfig};
/// use gatehouse_core::{fn_authenticator, ClaimsPrincipal};
/// use gatehouse_policy::AuthenticationSchemes;
///
/// let mut config = GatehouseConfig::default();
/// config.eviction.enabled = false;
/// config.defaults.scheme = Some("bearer".to_string());
///
/// let mut schemes = AuthenticationSchemes::new();
/// schemes.add("bearer", fn_authenticator(|req| Ok(req.bearer_token().map(ClaimsPrincipal::new))))?;
///
/// let gatehouse = Gatehouse::builder(config).schemes(schemes).strict(true).build()?;
/// assert!(gatehouse.resolver().unresolved_references().is_empty());
/// # Ok::<(), gatehouse_core::GatehouseError>(())
/// ```
pub struct GatehouseBuilder {
    config: GatehouseConfig,
    schemes: AuthenticationSchemes,
    policies: AuthorizationPolicies,
    limiters: LimiterRegistry,
    routes: Vec<RouteSpec>,
    groups: Vec<GroupSpec>,
    strict: bool,
}

impl GatehouseBuilder {
    /// Creates a builder with no handlers registered.
    pub fn new(config: GatehouseConfig) -> Self {
        Self {
            config,
            schemes: AuthenticationSchemes::new(),
            policies: AuthorizationPolicies::new(),
            limiters: LimiterRegistry::new(),
            routes: Vec::new(),
            groups: Vec::new(),
            strict: false,
        }
    }

    /// Sets the authentication scheme handlers.
    #[must_use]
    pub fn schemes(mut self, schemes: AuthenticationSchemes) -> Self {
        self.schemes = schemes;
        self
    }

    /// Sets the authorization policies.
    #[must_use]
    pub fn policies(mut self, policies: AuthorizationPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Starts from `limiters`; configured limiters are registered into it.
    #[must_use]
    pub fn limiters(mut self, limiters: LimiterRegistry) -> Self {
        self.limiters = limiters;
        self
    }

    /// Declares a route in code.
    #[must_use]
    pub fn route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    /// Declares a route group in code.
    #[must_use]
    pub fn group(mut self, group: GroupSpec) -> Self {
        self.groups.push(group);
        self
    }

    /// Fails the build when a route or default names something unregistered.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validates the configuration and assembles the engine.
    ///
    /// Starts the idle key sweeper when eviction is enabled and a tokio
    /// runtime is available.
    pub fn build(self) -> GatehouseResult<Gatehouse> {
        let Self {
            config,
            schemes,
            policies,
            mut limiters,
            routes,
            groups,
            strict,
        } = self;

        config
            .validate()
            .map_err(|err| GatehouseError::invalid_configuration("configuration failed validation", err))?;

        for limiter in &config.limiters {
            limiter.register(&mut limiters)?;
        }

        let mut builder = SecurityPolicyBuilder::new();
        for route in &config.routes {
            let spec = route
                .to_spec()
                .map_err(|err| GatehouseError::invalid_configuration(format!("route '{}'", route.path), err))?;
            builder.route(spec)?;
        }
        for group in &config.groups {
            let spec = group
                .to_spec()
                .map_err(|err| GatehouseError::invalid_configuration(format!("group '{}'", group.prefix), err))?;
            builder.group(spec)?;
        }
        for route in routes {
            builder.route(route)?;
        }
        for group in groups {
            builder.group(group)?;
        }
        builder.defaults(config.defaults.clone());

        let resolver = SecurityResolver::new(
            builder.build(),
            schemes,
            policies,
            Arc::new(limiters),
            config.resolver.to_options(),
        );

        if strict {
            if let Some(missing) = resolver.unresolved_references().first() {
                return Err(GatehouseError::unknown_reference(missing.kind, missing.name.clone()));
            }
        }

        let resolver = Arc::new(resolver);
        let sweeper = if !config.eviction.enabled {
            None
        } else if tokio::runtime::Handle::try_current().is_ok() {
            Some(spawn_sweeper(
                resolver.limiters(),
                config.eviction.idle_ttl(),
                config.eviction.sweep_interval(),
            ))
        } else {
            warn!("no tokio runtime, idle rate limiter keys will not be swept");
            None
        };

        info!(
            routes = resolver.policy().routes().len(),
            limiters = resolver.limiters().len(),
            sweeper = sweeper.is_some(),
            "gatehouse ready"
        );

        Ok(Gatehouse { resolver, sweeper })
    }
}

impl fmt::Debug for GatehouseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatehouseBuilder")
            .field("schemes", &self.schemes.names().collect::<Vec<_>>())
            .field("limiters", &self.limiters.len())
            .field("routes", &self.routes.len())
            .field("groups", &self.groups.len())
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_config::RouteConfig;
    use gatehouse_core::PolicyKind;
    use gatehouse_ratelimit::FixedWindowOptions;
    use http::Method;
    use std::time::Duration;

    fn quiet() -> GatehouseConfig {
        let mut config = GatehouseConfig::default();
        config.eviction.enabled = false;
        config
    }

    fn route(methods: &[&str], path: &str) -> RouteConfig {
        RouteConfig {
            methods: methods.iter().map(|m| (*m).to_string()).collect(),
            path: path.to_string(),
            ..RouteConfig::default()
        }
    }

    #[test]
    fn test_build_without_runtime_skips_sweeper() {
        let gatehouse = Gatehouse::builder(GatehouseConfig::default()).build().unwrap();
        assert!(!gatehouse.has_sweeper());
    }

    #[tokio::test]
    async fn test_sweeper_runs_when_enabled() {
        let gatehouse = Gatehouse::builder(GatehouseConfig::default()).build().unwrap();
        assert!(gatehouse.has_sweeper());
        gatehouse.shutdown().await;

        let gatehouse = Gatehouse::builder(quiet()).build().unwrap();
        assert!(!gatehouse.has_sweeper());
    }

    #[test]
    fn test_code_routes_join_configured_routes() {
        let mut config = quiet();
        config.routes.push(RouteConfig {
            limiters: vec!["burst".to_string()],
            ..route(&["GET"], "/items/{id}")
        });

        let mut limiters = LimiterRegistry::new();
        limiters
            .add_fixed_window("burst", FixedWindowOptions::new(5, Duration::from_secs(1)))
            .unwrap();

        let gatehouse = Gatehouse::builder(config)
            .limiters(limiters)
            .route(RouteSpec::new(Method::POST, "/items").limiters(["burst"]))
            .build()
            .unwrap();

        let policy = gatehouse.resolver().policy();
        assert_eq!(policy.limiters_for(&Method::GET, "/items/3"), vec!["burst"]);
        assert_eq!(policy.limiters_for(&Method::POST, "/items"), vec!["burst"]);
        assert!(gatehouse.resolver().unresolved_references().is_empty());
    }

    #[test]
    fn test_conflicting_config_is_rejected() {
        let mut config = quiet();
        config.routes.push(RouteConfig {
            schemes: vec!["bearer".to_string()],
            allow_anonymous: true,
            ..route(&["GET"], "/health")
        });

        let err = Gatehouse::builder(config).build().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_config_is_wrapped() {
        let mut config = quiet();
        config.routes.push(route(&[], "/nothing"));

        let err = Gatehouse::builder(config).build().unwrap_err();
        assert!(matches!(err, GatehouseError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_strict_rejects_unknown_names() {
        let mut config = quiet();
        config.defaults.policy = Some("admins".to_string());

        let err = Gatehouse::builder(config.clone()).strict(true).build().unwrap_err();
        match err {
            GatehouseError::UnknownPolicyReference { kind, name } => {
                assert_eq!(kind, PolicyKind::Policy);
                assert_eq!(name, "admins");
            }
            other => panic!("unexpected error: {other}"),
        }

        let lenient = Gatehouse::builder(config).build().unwrap();
        assert_eq!(lenient.resolver().unresolved_references().len(), 1);
    }
}
