//! Route to policy-name association tables.

use gatehouse_core::{GatehouseError, GatehouseResult, PolicyKind, RouteKey};
use indexmap::{IndexMap, IndexSet};

/// Ordered, duplicate-free policy names. Order of first insertion is
/// evaluation order.
pub(crate) type NameSet = IndexSet<String>;

/// The three association maps plus the allow-anonymous set.
///
/// Invariant: a key in `anonymous` never appears in `authentication`, and
/// the reverse. Both insertion paths check it.
#[derive(Debug, Default, Clone)]
pub(crate) struct PolicyTables {
    authentication: IndexMap<RouteKey, NameSet>,
    authorization: IndexMap<RouteKey, NameSet>,
    rate_limits: IndexMap<RouteKey, NameSet>,
    anonymous: IndexSet<RouteKey>,
}

impl PolicyTables {
    fn map(&self, kind: PolicyKind) -> &IndexMap<RouteKey, NameSet> {
        match kind {
            PolicyKind::Scheme => &self.authentication,
            PolicyKind::Policy => &self.authorization,
            PolicyKind::Limiter => &self.rate_limits,
        }
    }

    fn map_mut(&mut self, kind: PolicyKind) -> &mut IndexMap<RouteKey, NameSet> {
        match kind {
            PolicyKind::Scheme => &mut self.authentication,
            PolicyKind::Policy => &mut self.authorization,
            PolicyKind::Limiter => &mut self.rate_limits,
        }
    }

    /// Merges `names` into the set for `key`.
    ///
    /// Scheme insertion fails for allow-anonymous routes.
    pub(crate) fn merge(&mut self, kind: PolicyKind, key: &RouteKey, names: &[String]) -> GatehouseResult<()> {
        if kind == PolicyKind::Scheme && self.anonymous.contains(key) {
            return Err(GatehouseError::configuration_conflict(format!(
                "{key} is allow-anonymous and cannot require authentication schemes"
            )));
        }
        let set = self.map_mut(kind).entry(key.clone()).or_default();
        for name in names {
            if !set.contains(name) {
                set.insert(name.clone());
            }
        }
        Ok(())
    }

    /// Marks `key` allow-anonymous.
    ///
    /// Fails if the route already has schemes or is already marked.
    pub(crate) fn mark_anonymous(&mut self, key: &RouteKey) -> GatehouseResult<()> {
        if self.authentication.contains_key(key) {
            return Err(GatehouseError::configuration_conflict(format!(
                "{key} has authentication schemes and cannot be allow-anonymous"
            )));
        }
        if !self.anonymous.insert(key.clone()) {
            return Err(GatehouseError::configuration_conflict(format!(
                "{key} is already marked allow-anonymous"
            )));
        }
        Ok(())
    }

    pub(crate) fn names(&self, kind: PolicyKind, key: &RouteKey) -> Option<&NameSet> {
        self.map(kind).get(key).filter(|set| !set.is_empty())
    }

    pub(crate) fn is_anonymous(&self, key: &RouteKey) -> bool {
        self.anonymous.contains(key)
    }

    pub(crate) fn anonymous(&self) -> impl Iterator<Item = &RouteKey> {
        self.anonymous.iter()
    }

    /// Keys whose `kind` set contains `name`, in insertion order.
    pub(crate) fn routes_referencing(&self, kind: PolicyKind, name: &str) -> Vec<RouteKey> {
        self.map(kind)
            .iter()
            .filter(|(_, names)| names.contains(name))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Every `(name, key)` pair of `kind`.
    pub(crate) fn references(&self, kind: PolicyKind) -> impl Iterator<Item = (&str, &RouteKey)> {
        self.map(kind)
            .iter()
            .flat_map(|(key, names)| names.iter().map(move |name| (name.as_str(), key)))
    }

    pub(crate) fn configured_routes(&self, kind: PolicyKind) -> usize {
        self.map(kind).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn key(path: &str) -> RouteKey {
        RouteKey::new(Method::GET, path)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_merge_preserves_first_insertion_order() {
        let mut tables = PolicyTables::default();
        tables.merge(PolicyKind::Scheme, &key("/a"), &names(&["cookie", "jwt"])).unwrap();
        tables.merge(PolicyKind::Scheme, &key("/a"), &names(&["jwt", "api-key"])).unwrap();

        let set = tables.names(PolicyKind::Scheme, &key("/a")).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["cookie", "jwt", "api-key"]);
    }

    #[test]
    fn test_anonymous_then_scheme_conflicts() {
        let mut tables = PolicyTables::default();
        tables.mark_anonymous(&key("/health")).unwrap();
        let err = tables
            .merge(PolicyKind::Scheme, &key("/health"), &names(&["jwt"]))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(tables.names(PolicyKind::Scheme, &key("/health")).is_none());
    }

    #[test]
    fn test_scheme_then_anonymous_conflicts() {
        let mut tables = PolicyTables::default();
        tables.merge(PolicyKind::Scheme, &key("/me"), &names(&["jwt"])).unwrap();
        assert!(tables.mark_anonymous(&key("/me")).is_err());
        assert!(!tables.is_anonymous(&key("/me")));
    }

    #[test]
    fn test_duplicate_anonymous_is_rejected() {
        let mut tables = PolicyTables::default();
        tables.mark_anonymous(&key("/login")).unwrap();
        assert!(tables.mark_anonymous(&key("/login")).is_err());
    }

    #[test]
    fn test_anonymous_routes_may_carry_policies_and_limiters() {
        let mut tables = PolicyTables::default();
        tables.mark_anonymous(&key("/login")).unwrap();
        tables.merge(PolicyKind::Policy, &key("/login"), &names(&["any"])).unwrap();
        tables.merge(PolicyKind::Limiter, &key("/login"), &names(&["strict"])).unwrap();
        assert!(tables.names(PolicyKind::Limiter, &key("/login")).is_some());
    }

    #[test]
    fn test_routes_referencing() {
        let mut tables = PolicyTables::default();
        tables.merge(PolicyKind::Limiter, &key("/a"), &names(&["api"])).unwrap();
        tables.merge(PolicyKind::Limiter, &key("/b"), &names(&["burst"])).unwrap();
        tables.merge(PolicyKind::Limiter, &key("/c"), &names(&["api", "burst"])).unwrap();

        assert_eq!(
            tables.routes_referencing(PolicyKind::Limiter, "api"),
            vec![key("/a"), key("/c")]
        );
        assert_eq!(tables.references(PolicyKind::Limiter).count(), 4);
        assert_eq!(tables.configured_routes(PolicyKind::Limiter), 3);
    }
}
