//! Per-node method table.
//!
//! Each terminal node of the radix tree owns a [`MethodTable`] recording which
//! HTTP methods were registered there and under which template. Keeping the
//! template per method lets `GET /users/:id` and `DELETE /users/:userId` share
//! one node while still resolving to their own canonical keys.

use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;

use crate::error::RouteError;

/// Methods registered at a single tree node, with their templates.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    entries: SmallVec<[(Method, Arc<str>); 2]>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `template` for `method`.
    ///
    /// Returns `Ok(false)` when the exact pair is already present, which makes
    /// registration idempotent.
    pub(crate) fn insert(&mut self, method: &Method, template: &Arc<str>) -> Result<bool, RouteError> {
        if let Some((_, existing)) = self.entries.iter().find(|(m, _)| m == method) {
            if existing == template {
                return Ok(false);
            }
            return Err(RouteError::Conflict {
                method: method.clone(),
                existing: existing.to_string(),
                template: template.to_string(),
            });
        }
        self.entries.push((method.clone(), Arc::clone(template)));
        Ok(true)
    }

    /// Returns the template registered for `method`.
    #[must_use]
    pub fn template(&self, method: &Method) -> Option<&Arc<str>> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, t)| t)
    }

    /// Iterates the registered methods in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    /// Iterates `(method, template)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.entries.iter().map(|(m, t)| (m, t.as_ref()))
    }

    /// Returns true if nothing is registered here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn test_insert_new_method() {
        let mut table = MethodTable::new();
        assert!(table.insert(&Method::GET, &template("/users")).unwrap());
        assert_eq!(table.len(), 1);
        assert_eq!(table.template(&Method::GET).map(AsRef::as_ref), Some("/users"));
        assert!(table.template(&Method::POST).is_none());
    }

    #[test]
    fn test_insert_same_pair_is_noop() {
        let mut table = MethodTable::new();
        table.insert(&Method::GET, &template("/users/:id")).unwrap();
        assert!(!table.insert(&Method::GET, &template("/users/:id")).unwrap());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_insert_conflicting_template() {
        let mut table = MethodTable::new();
        table.insert(&Method::GET, &template("/users/:id")).unwrap();
        let err = table
            .insert(&Method::GET, &template("/users/:uid"))
            .unwrap_err();
        assert!(matches!(err, RouteError::Conflict { .. }));
    }

    #[test]
    fn test_different_methods_keep_own_templates() {
        let mut table = MethodTable::new();
        table.insert(&Method::GET, &template("/users/:id")).unwrap();
        table.insert(&Method::DELETE, &template("/users/:userId")).unwrap();

        assert_eq!(table.template(&Method::GET).map(AsRef::as_ref), Some("/users/:id"));
        assert_eq!(
            table.template(&Method::DELETE).map(AsRef::as_ref),
            Some("/users/:userId")
        );
        let methods: Vec<_> = table.methods().cloned().collect();
        assert_eq!(methods, vec![Method::GET, Method::DELETE]);
    }

    #[test]
    fn test_extension_methods_supported() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let mut table = MethodTable::new();
        table.insert(&purge, &template("/cache")).unwrap();
        assert!(table.template(&purge).is_some());
    }
}
