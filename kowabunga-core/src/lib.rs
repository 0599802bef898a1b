//! Kowabunga Core
//!
//! Provider-agnostic plumbing: attribute values, resource state, schemas,
//! the Provider trait and the desired-vs-current differ

pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
