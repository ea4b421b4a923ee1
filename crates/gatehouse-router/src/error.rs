//! Route registration errors.

use http::Method;
use thiserror::Error;

/// Errors raised while registering a route template.
///
/// Matching never fails with an error: an unmatched path is simply `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The template string was empty.
    #[error("route template is empty")]
    EmptyPath,

    /// A parameter segment has no name (e.g. `/users/:` or `/users/{}`).
    #[error("empty parameter name in template '{template}'")]
    EmptyParameterName {
        /// The offending template.
        template: String,
    },

    /// A parameter name contains characters other than ASCII alphanumerics and `_`.
    #[error("invalid parameter name '{name}' in template '{template}'")]
    InvalidParameterName {
        /// The offending template.
        template: String,
        /// The rejected parameter name.
        name: String,
    },

    /// The same parameter name appears twice in one template.
    #[error("parameter '{name}' appears more than once in template '{template}'")]
    DuplicateParameter {
        /// The offending template.
        template: String,
        /// The repeated parameter name.
        name: String,
    },

    /// Catch-all, optional and regex-constrained segments are not supported.
    #[error("unsupported segment '{segment}' in template '{template}'")]
    UnsupportedSegment {
        /// The offending template.
        template: String,
        /// The rejected segment.
        segment: String,
    },

    /// Two structurally identical templates were registered for one method
    /// with different parameter names.
    #[error("{method} {template} conflicts with already registered {method} {existing}")]
    Conflict {
        /// The HTTP method.
        method: Method,
        /// The template already occupying the slot.
        existing: String,
        /// The template being registered.
        template: String,
    },
}
