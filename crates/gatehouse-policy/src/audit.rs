//! Detection of names that routes reference but nothing registered.

use gatehouse_core::{PolicyKind, RouteKey};
use gatehouse_ratelimit::LimiterRegistry;
use indexmap::IndexMap;

use crate::handlers::{AuthenticationSchemes, AuthorizationPolicies};
use crate::policy::SecurityPolicy;

/// A scheme, policy or limiter name with no registration behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// What kind of name it is.
    pub kind: PolicyKind,
    /// The missing name.
    pub name: String,
    /// Routes that reference it explicitly.
    pub routes: Vec<RouteKey>,
    /// Whether the global default names it.
    pub from_default: bool,
}

/// Collects every unresolved reference in `policy`.
///
/// Results are grouped per `(kind, name)`, ordered by kind and then by
/// first appearance.
pub fn unresolved_references(
    policy: &SecurityPolicy,
    schemes: &AuthenticationSchemes,
    policies: &AuthorizationPolicies,
    limiters: &LimiterRegistry,
) -> Vec<UnresolvedReference> {
    let mut out = Vec::new();

    for kind in [PolicyKind::Scheme, PolicyKind::Policy, PolicyKind::Limiter] {
        let known = |name: &str| match kind {
            PolicyKind::Scheme => schemes.contains(name),
            PolicyKind::Policy => policies.contains(name),
            PolicyKind::Limiter => limiters.contains(name),
        };

        let mut missing: IndexMap<&str, UnresolvedReference> = IndexMap::new();
        for (name, key) in policy.tables().references(kind) {
            if known(name) {
                continue;
            }
            missing
                .entry(name)
                .or_insert_with(|| UnresolvedReference {
                    kind,
                    name: name.to_string(),
                    routes: Vec::new(),
                    from_default: false,
                })
                .routes
                .push(key.clone());
        }

        if let Some(name) = policy.defaults().get(kind) {
            if !known(name) {
                missing
                    .entry(name)
                    .or_insert_with(|| UnresolvedReference {
                        kind,
                        name: name.to_string(),
                        routes: Vec::new(),
                        from_default: true,
                    })
                    .from_default = true;
            }
        }

        out.extend(missing.into_values());
    }

    out
}
