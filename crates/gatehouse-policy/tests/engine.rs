//! End-to-end behavior of the policy engine through its public API.

use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{fn_authenticator, ClaimsPrincipal, Outcome, RequestView, RouteKey};
use gatehouse_policy::{
    require_claim, AuthenticationOutcome, AuthenticationSchemes, AuthorizationPolicies, GroupSpec, RateLimitDecision,
    ResolverOptions, RouteSpec, SecurityPolicyBuilder, SecurityProvider, SecurityResolver,
};
use gatehouse_ratelimit::{ConcurrencyOptions, FixedWindowOptions, LimiterRegistry, SlidingWindowOptions, TokenBucketOptions};
use http::{HeaderMap, Method, Uri};
use tokio::time::advance;

fn schemes() -> AuthenticationSchemes {
    let mut schemes = AuthenticationSchemes::new();
    schemes
        .add(
            "bearer",
            fn_authenticator(|req| {
                Ok(req
                    .bearer_token()
                    .map(|token| ClaimsPrincipal::new(token).with_claim("tenant", token)))
            }),
        )
        .unwrap();
    schemes
}

fn policies() -> AuthorizationPolicies {
    let mut policies = AuthorizationPolicies::new();
    policies.add("acme-only", require_claim("tenant", "acme")).unwrap();
    policies
}

fn resolver(builder: SecurityPolicyBuilder, limiters: LimiterRegistry) -> SecurityResolver {
    SecurityResolver::new(
        builder.build(),
        schemes(),
        policies(),
        Arc::new(limiters),
        ResolverOptions::default(),
    )
}

async fn authenticate(provider: &dyn SecurityProvider, method: Method, path: &'static str, token: Option<&str>) -> AuthenticationOutcome {
    let uri = Uri::from_static(path);
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
    }
    let view = RequestView::new(&method, &uri, &headers);
    provider.authenticate(&view).await
}

#[test]
fn test_scheme_fallback() {
    let mut with_default = SecurityPolicyBuilder::new();
    with_default
        .default_scheme("bearer")
        .add_authentication_schemes(&[RouteKey::new(Method::GET, "/explicit")], ["cookie"])
        .unwrap()
        .add_rate_limit_policies(&[RouteKey::new(Method::GET, "/limited")], ["global"])
        .unwrap();
    let policy = with_default.build();

    assert_eq!(policy.schemes_for(&Method::GET, "/explicit"), vec!["cookie"]);
    assert_eq!(policy.schemes_for(&Method::GET, "/limited"), vec!["bearer"]);
    assert_eq!(policy.schemes_for(&Method::GET, "/unregistered"), vec!["bearer"]);

    let without_default = SecurityPolicyBuilder::new().build();
    assert!(without_default.schemes_for(&Method::GET, "/unregistered").is_empty());
}

#[test]
fn test_mutual_exclusion_both_directions() {
    let route = [RouteKey::new(Method::GET, "/status")];

    let mut builder = SecurityPolicyBuilder::new();
    builder.mark_allow_anonymous(&route).unwrap();
    assert!(builder.add_authentication_schemes(&route, ["bearer"]).unwrap_err().is_configuration());

    let mut builder = SecurityPolicyBuilder::new();
    builder.add_authentication_schemes(&route, ["bearer"]).unwrap();
    assert!(builder.mark_allow_anonymous(&route).unwrap_err().is_configuration());

    let policy = builder.build();
    assert!(!policy.is_allow_anonymous(&Method::GET, "/status"));
    assert!(policy.anonymous_routes().all(|key| policy.routes_for_scheme("bearer").iter().all(|k| k != key)));
}

#[test]
fn test_canonicalization_shares_policy() {
    let mut builder = SecurityPolicyBuilder::new();
    builder
        .route(RouteSpec::new(Method::GET, "/user/:id").policies(["acme-only"]))
        .unwrap();
    let policy = builder.build();

    let a = policy.resolve(&Method::GET, "/user/77").unwrap();
    let b = policy.resolve(&Method::GET, "/user/12345").unwrap();
    assert_eq!(a, b);
    assert_eq!(a, RouteKey::new(Method::GET, "/user/:id"));
    assert_eq!(policy.policies_for(&Method::GET, "/user/77"), vec!["acme-only"]);
}

#[test]
fn test_reverse_indexes() {
    let mut builder = SecurityPolicyBuilder::new();
    builder
        .group(
            GroupSpec::new("/api")
                .limiters(["global"])
                .route(RouteSpec::new(Method::GET, "/a"))
                .route(RouteSpec::new(Method::GET, "/b").limiters(["strict"])),
        )
        .unwrap();
    let policy = builder.build();

    assert_eq!(policy.routes_for_limiter("global").len(), 2);
    assert_eq!(
        policy.routes_for_limiter("strict"),
        vec![RouteKey::new(Method::GET, "/api/b")]
    );
    assert!(policy.routes_for_policy("global").is_empty());
}

#[tokio::test]
async fn test_full_request_flow() {
    let mut builder = SecurityPolicyBuilder::new();
    builder
        .default_scheme("bearer")
        .route(RouteSpec::new(Method::GET, "/public").allow_anonymous())
        .unwrap()
        .route(RouteSpec::new(Method::GET, "/tenants/{tenant}/reports").policies(["acme-only"]))
        .unwrap();
    let resolver = resolver(builder, LimiterRegistry::new());

    let anonymous = authenticate(&resolver, Method::GET, "/public", None).await;
    assert!(matches!(anonymous, AuthenticationOutcome::Anonymous));

    let missing = authenticate(&resolver, Method::GET, "/tenants/acme/reports", None).await;
    assert_eq!(missing.outcome(), Outcome::Unauthorized);

    let acme = authenticate(&resolver, Method::GET, "/tenants/acme/reports", Some("acme")).await;
    assert_eq!(
        resolver.authorize(&Method::GET, "/tenants/acme/reports", acme.principal()),
        Outcome::Allowed
    );

    let globex = authenticate(&resolver, Method::GET, "/tenants/acme/reports", Some("globex")).await;
    assert_eq!(
        resolver.authorize(&Method::GET, "/tenants/acme/reports", globex.principal()),
        Outcome::Forbidden
    );
}

#[tokio::test(start_paused = true)]
async fn test_aggregate_decision_takes_longest_retry() {
    let mut limiters = LimiterRegistry::new();
    limiters
        .add_fixed_window("two-seconds", FixedWindowOptions::new(1, Duration::from_secs(2)))
        .unwrap();
    limiters
        .add_sliding_window("five-seconds", SlidingWindowOptions::new(1, Duration::from_secs(5), 5))
        .unwrap();

    let mut builder = SecurityPolicyBuilder::new();
    builder
        .add_rate_limit_policies(&[RouteKey::new(Method::POST, "/orders")], ["two-seconds", "five-seconds"])
        .unwrap();
    let resolver = resolver(builder, limiters);

    assert!(resolver.rate_limit(&Method::POST, "/orders", "k").is_allowed());
    let decision = resolver.rate_limit(&Method::POST, "/orders", "k");
    assert_eq!(decision.outcome().retry_after_seconds(), Some(5));
    match decision {
        RateLimitDecision::Limited { limiter, .. } => assert_eq!(limiter, "five-seconds"),
        RateLimitDecision::Allowed(_) => panic!("expected denial"),
    }

    // Another client is unaffected.
    assert!(resolver.rate_limit(&Method::POST, "/orders", "other").is_allowed());
}

#[tokio::test(start_paused = true)]
async fn test_token_bucket_through_resolver() {
    let mut limiters = LimiterRegistry::new();
    limiters
        .add_token_bucket("burst", TokenBucketOptions::new(5, 1, Duration::from_secs(1)))
        .unwrap();
    let mut builder = SecurityPolicyBuilder::new();
    builder.default_limiter("burst");
    let resolver = resolver(builder, limiters);

    for _ in 0..5 {
        assert!(resolver.rate_limit(&Method::GET, "/feed", "k").is_allowed());
    }
    let denied = resolver.rate_limit(&Method::GET, "/feed", "k");
    assert_eq!(
        denied.outcome(),
        Outcome::RateLimited {
            retry_after: Duration::from_secs(1)
        }
    );

    advance(Duration::from_secs(1)).await;
    assert!(resolver.rate_limit(&Method::GET, "/feed", "k").is_allowed());
    assert!(!resolver.rate_limit(&Method::GET, "/feed", "k").is_allowed());
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_release_on_completion() {
    let mut limiters = LimiterRegistry::new();
    limiters.add_concurrency("uploads", ConcurrencyOptions::new(2)).unwrap();
    let mut builder = SecurityPolicyBuilder::new();
    builder
        .add_rate_limit_policies(&[RouteKey::new(Method::PUT, "/files/:name")], ["uploads"])
        .unwrap();
    let resolver = resolver(builder, limiters);

    let first = resolver.rate_limit(&Method::PUT, "/files/a", "k").into_lease().unwrap();
    let _second = resolver.rate_limit(&Method::PUT, "/files/b", "k").into_lease().unwrap();
    assert!(!resolver.rate_limit(&Method::PUT, "/files/c", "k").is_allowed());

    first.release();
    assert!(resolver.rate_limit(&Method::PUT, "/files/c", "k").is_allowed());
}
