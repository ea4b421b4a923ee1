//! Security stages.
//!
//! They run in a fixed order:
//!
//! 1. [`authentication`] - resolve the principal or answer `401`
//! 2. [`authorization`] - evaluate policies or answer `401`/`403`
//! 3. [`rate_limit`] - take limiter permits or answer `429`
//!
//! Rate limiting runs last so it can key on the authenticated subject.

pub mod authentication;
pub mod authorization;
pub mod rate_limit;

pub use authentication::AuthenticationStage;
pub use authorization::AuthorizationStage;
pub use rate_limit::{client_address, KeyExtractor, RateLimitStage};
