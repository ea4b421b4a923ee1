//! Built-in authorization predicates.

use gatehouse_core::ClaimsPrincipal;
use serde_json::Value;

/// Requires every listed role.
///
/// ```rust
/// use gatehouse_core::{AuthorizationPolicy, ClaimsPrincipal};
/// use gatehouse_policy::require_role;
///
/// let policy = require_role(["admin", "auditor"]);
/// let alice = ClaimsPrincipal::new("alice").with_role("admin").with_role("auditor");
/// assert!(policy.evaluate(&alice));
/// assert!(!policy.evaluate(&ClaimsPrincipal::new("bob").with_role("admin")));
/// ```
pub fn require_role<I, S>(roles: I) -> impl Fn(&ClaimsPrincipal) -> bool + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
    move |principal| roles.iter().all(|role| principal.is_in_role(role))
}

/// Requires a claim of `claim_type` whose value equals `value`.
pub fn require_claim(
    claim_type: impl Into<String>,
    value: impl Into<Value>,
) -> impl Fn(&ClaimsPrincipal) -> bool + Send + Sync + 'static {
    let claim_type = claim_type.into();
    let value = value.into();
    move |principal| principal.has_claim_value(&claim_type, &value)
}

/// Requires any claim of `claim_type`.
pub fn require_has_claim(claim_type: impl Into<String>) -> impl Fn(&ClaimsPrincipal) -> bool + Send + Sync + 'static {
    let claim_type = claim_type.into();
    move |principal| principal.has_claim(&claim_type)
}
