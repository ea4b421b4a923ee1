//! Named authentication schemes and authorization policies.

use std::fmt;
use std::sync::Arc;

use gatehouse_core::{AuthenticationHandler, AuthorizationPolicy, GatehouseError, GatehouseResult, PolicyKind};
use indexmap::IndexMap;

/// Authentication handlers registered by scheme name.
#[derive(Clone, Default)]
pub struct AuthenticationSchemes {
    handlers: IndexMap<String, Arc<dyn AuthenticationHandler>>,
}

impl AuthenticationSchemes {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    ///
    /// Duplicate names are a configuration error.
    pub fn add(&mut self, name: impl Into<String>, handler: impl AuthenticationHandler) -> GatehouseResult<()> {
        self.add_shared(name, Arc::new(handler))
    }

    /// Registers an already shared handler.
    pub fn add_shared(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn AuthenticationHandler>,
    ) -> GatehouseResult<()> {
        let name = checked_name(name.into(), PolicyKind::Scheme)?;
        if self.handlers.contains_key(&name) {
            return Err(GatehouseError::duplicate(PolicyKind::Scheme, name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Looks up a handler.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthenticationHandler>> {
        self.handlers.get(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of schemes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no schemes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for AuthenticationSchemes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationSchemes")
            .field("names", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Authorization predicates registered by policy name.
///
/// ```rust
/// use gatehouse_policy::{require_role, AuthorizationPolicies};
///
/// let mut policies = AuthorizationPolicies::new();
/// policies.add("admin", require_role(["admin"])).unwrap();
/// policies.add("verified", |p: &gatehouse_core::ClaimsPrincipal| p.has_claim("email_verified")).unwrap();
/// assert!(policies.add("admin", require_role(["root"])).is_err());
/// ```
#[derive(Clone, Default)]
pub struct AuthorizationPolicies {
    policies: IndexMap<String, Arc<dyn AuthorizationPolicy>>,
}

impl AuthorizationPolicies {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `policy` under `name`.
    ///
    /// Duplicate names are a configuration error.
    pub fn add(&mut self, name: impl Into<String>, policy: impl AuthorizationPolicy) -> GatehouseResult<()> {
        let name = checked_name(name.into(), PolicyKind::Policy)?;
        if self.policies.contains_key(&name) {
            return Err(GatehouseError::duplicate(PolicyKind::Policy, name));
        }
        self.policies.insert(name, Arc::new(policy));
        Ok(())
    }

    /// Looks up a policy.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthorizationPolicy>> {
        self.policies.get(name)
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Number of policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true if no policies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl fmt::Debug for AuthorizationPolicies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationPolicies")
            .field("names", &self.policies.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn checked_name(name: String, kind: PolicyKind) -> GatehouseResult<String> {
    if name.trim().is_empty() {
        return Err(GatehouseError::invalid_declaration(format!("{kind} name must not be empty")));
    }
    Ok(name)
}
