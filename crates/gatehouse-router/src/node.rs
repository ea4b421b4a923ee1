//! Radix tree node used by [`RouteRegistry`](crate::RouteRegistry).

use std::collections::HashSet;
use std::sync::Arc;

use http::Method;

use crate::error::RouteError;
use crate::key::RouteKey;
use crate::method_table::MethodTable;

/// A parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Literal text that must match exactly.
    Static(String),
    /// A named parameter matching any single non-empty segment.
    Param(String),
}

/// Parses a normalized template into segments, validating parameter names.
pub(crate) fn parse_template(template: &str) -> Result<Vec<Segment>, RouteError> {
    let mut segments = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for raw in template.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = raw.strip_prefix(':') {
            if name.is_empty() {
                return Err(RouteError::EmptyParameterName {
                    template: template.to_string(),
                });
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(RouteError::InvalidParameterName {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(RouteError::DuplicateParameter {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }
            segments.push(Segment::Param(name.to_string()));
        } else if raw.contains(['*', '{', '}', '(', ')', '?']) {
            return Err(RouteError::UnsupportedSegment {
                template: template.to_string(),
                segment: raw.to_string(),
            });
        } else {
            segments.push(Segment::Static(raw.to_string()));
        }
    }

    Ok(segments)
}

/// A node in the route tree.
///
/// Static children are kept sorted by segment so lookups use binary search.
/// At most one parameter child exists per node; its name is irrelevant to
/// matching because each method remembers its own template.
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    segment: String,
    methods: MethodTable,
    static_children: Vec<Node>,
    param_child: Option<Box<Node>>,
}

impl Node {
    pub(crate) fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ..Self::default()
        }
    }

    /// Inserts `template` for `method` below this node.
    pub(crate) fn insert(
        &mut self,
        segments: &[Segment],
        method: &Method,
        template: &Arc<str>,
    ) -> Result<bool, RouteError> {
        let Some((first, rest)) = segments.split_first() else {
            return self.methods.insert(method, template);
        };

        match first {
            Segment::Static(text) => {
                let idx = match self
                    .static_children
                    .binary_search_by(|child| child.segment.as_str().cmp(text))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.static_children.insert(idx, Node::new(text.clone()));
                        idx
                    }
                };
                self.static_children[idx].insert(rest, method, template)
            }
            Segment::Param(_) => self
                .param_child
                .get_or_insert_with(|| Box::new(Node::new(":")))
                .insert(rest, method, template),
        }
    }

    /// Finds the template matching `path` for `method`.
    ///
    /// Static children are tried first. If the static branch dead-ends, or
    /// reaches a leaf without `method`, the parameter branch is tried.
    pub(crate) fn find(&self, path: &[&str], method: &Method) -> Option<&Arc<str>> {
        let Some((first, rest)) = path.split_first() else {
            return self.methods.template(method);
        };

        if let Some(child) = self.static_child(first) {
            if let Some(found) = child.find(rest, method) {
                return Some(found);
            }
        }

        self.param_child
            .as_deref()
            .and_then(|child| child.find(rest, method))
    }

    /// Collects every method registered at any leaf matching `path`.
    pub(crate) fn collect_methods(&self, path: &[&str], out: &mut Vec<Method>) {
        let Some((first, rest)) = path.split_first() else {
            for method in self.methods.methods() {
                if !out.contains(method) {
                    out.push(method.clone());
                }
            }
            return;
        };

        if let Some(child) = self.static_child(first) {
            child.collect_methods(rest, out);
        }
        if let Some(child) = self.param_child.as_deref() {
            child.collect_methods(rest, out);
        }
    }

    /// Appends every registered route below this node.
    pub(crate) fn collect_routes(&self, out: &mut Vec<RouteKey>) {
        for (method, template) in self.methods.iter() {
            out.push(RouteKey::from_normalized(method.clone(), Arc::from(template)));
        }
        for child in &self.static_children {
            child.collect_routes(out);
        }
        if let Some(child) = self.param_child.as_deref() {
            child.collect_routes(out);
        }
    }

    fn static_child(&self, segment: &str) -> Option<&Node> {
        self.static_children
            .binary_search_by(|child| child.segment.as_str().cmp(segment))
            .ok()
            .map(|idx| &self.static_children[idx])
    }
}
