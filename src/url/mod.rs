//! URL handling module
//!
//! Normalization into frontier keys, host and origin extraction, and domain
//! pattern matching for skip lists and rate-limit overrides.

mod domain;
mod matcher;
mod normalize;

pub use domain::{domain_of, extract_domain, origin_of, same_site};
pub use matcher::{matches_any, matches_wildcard, most_specific_match};
pub use normalize::normalize_url;
