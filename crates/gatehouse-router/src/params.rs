//! Captured path parameters.
//!
//! Parameters are rebuilt after a match by walking the matched template
//! alongside the concrete path, so the tree never has to carry them during
//! backtracking.

use smallvec::SmallVec;

/// Number of parameters stored inline before spilling to the heap.
const INLINE_PARAMS: usize = 4;

/// Named values captured from a concrete path.
///
/// # Example
///
/// ```rust
/// use gatehouse_router::Params;
///
/// let params = Params::from_match("/orgs/:org/users/:id", "/orgs/acme/users/7");
/// assert_eq!(params.get("org"), Some("acme"));
/// assert_eq!(params.get("id"), Some("7"));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs each `:name` segment of `template` with the segment at the same
    /// position in `path`.
    ///
    /// Both inputs are split on `/` with empty segments ignored, which is the
    /// same segmentation the registry matches with.
    #[must_use]
    pub fn from_match(template: &str, path: &str) -> Self {
        let mut params = Self::new();
        let template_segments = template.split('/').filter(|s| !s.is_empty());
        let path_segments = path.split('/').filter(|s| !s.is_empty());
        for (pattern, value) in template_segments.zip(path_segments) {
            if let Some(name) = pattern.strip_prefix(':') {
                params.push(name, value);
            }
        }
        params
    }

    /// Adds a parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates `(name, value)` pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_match_static_template() {
        let params = Params::from_match("/health", "/health");
        assert!(params.is_empty());
    }

    #[test]
    fn test_from_match_ignores_trailing_slash() {
        let params = Params::from_match("/users/:id", "/users/42/");
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn test_iter_preserves_order() {
        let params = Params::from_match("/a/:x/b/:y", "/a/1/b/2");
        let collected: Vec<_> = params.iter().collect();
        assert_eq!(collected, vec![("x", "1"), ("y", "2")]);
    }

    #[test]
    fn test_push_and_get() {
        let mut params = Params::new();
        params.push("id", "9");
        assert_eq!(params.get("id"), Some("9"));
        assert_eq!(params.get("missing"), None);
    }
}
