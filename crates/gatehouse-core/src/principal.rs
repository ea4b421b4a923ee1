//! Authenticated caller identity.
//!
//! Authentication handlers produce a [`ClaimsPrincipal`]; authorization
//! policies inspect it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single claim asserted about the principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. `"email"` or `"scope"`.
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Claim value.
    pub value: serde_json::Value,
}

impl Claim {
    /// Creates a claim.
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    /// Returns the value as a string slice if it is a JSON string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// The identity established by a successful authentication.
///
/// # Example
///
/// ```
/// use gatehouse_core::ClaimsPrincipal;
///
/// let mut principal = ClaimsPrincipal::new("user-123")
///     .with_name("Alice")
///     .with_authentication_method("bearer");
/// principal.add_role("admin");
/// principal.add_claim("email", "alice@example.com");
///
/// assert!(principal.is_in_role("admin"));
/// assert!(principal.has_claim("email"));
/// assert_eq!(principal.log_id(), "user:user-123");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    claims: Vec<Claim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authentication_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authenticated_at: Option<DateTime<Utc>>,
}

impl ClaimsPrincipal {
    /// Creates a principal for `subject`, stamped with the current time.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            authenticated_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.add_role(role);
        self
    }

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(
        mut self,
        claim_type: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.add_claim(claim_type, value);
        self
    }

    /// Sets the identity provider that vouched for the principal.
    #[must_use]
    pub fn with_identity_provider(mut self, provider: impl Into<String>) -> Self {
        self.identity_provider = Some(provider.into());
        self
    }

    /// Sets how the principal authenticated (e.g. `"bearer"`, `"cookie"`).
    #[must_use]
    pub fn with_authentication_method(mut self, method: impl Into<String>) -> Self {
        self.authentication_method = Some(method.into());
        self
    }

    /// Overrides the authentication timestamp.
    #[must_use]
    pub fn with_authenticated_at(mut self, at: DateTime<Utc>) -> Self {
        self.authenticated_at = Some(at);
        self
    }

    /// Adds a role unless already present. Returns true if it was added.
    pub fn add_role(&mut self, role: impl Into<String>) -> bool {
        let role = role.into();
        if self.roles.contains(&role) {
            return false;
        }
        self.roles.push(role);
        true
    }

    /// Returns true if the principal holds `role`.
    #[must_use]
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Appends a claim. Multiple claims of the same type are allowed.
    pub fn add_claim(&mut self, claim_type: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.claims.push(Claim::new(claim_type, value));
    }

    /// Returns the first claim of `claim_type`.
    #[must_use]
    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    /// Iterates every claim of `claim_type`.
    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |c| c.claim_type == claim_type)
    }

    /// Returns true if any claim of `claim_type` exists.
    #[must_use]
    pub fn has_claim(&self, claim_type: &str) -> bool {
        self.find_first(claim_type).is_some()
    }

    /// Returns true if a claim of `claim_type` carries exactly `value`.
    #[must_use]
    pub fn has_claim_value(&self, claim_type: &str, value: &serde_json::Value) -> bool {
        self.find_all(claim_type).any(|c| &c.value == value)
    }

    /// Subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Roles in insertion order.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// All claims in insertion order.
    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Identity provider.
    #[must_use]
    pub fn identity_provider(&self) -> Option<&str> {
        self.identity_provider.as_deref()
    }

    /// Authentication method.
    #[must_use]
    pub fn authentication_method(&self) -> Option<&str> {
        self.authentication_method.as_deref()
    }

    /// When authentication happened.
    #[must_use]
    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }

    /// Returns an identifier suitable for logging. Never includes claims.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.subject)
    }
}
