//! `warden-core`: shared identity primitives.
//!
//! This crate contains no IO and no HTTP concerns: just identifiers and the
//! error taxonomy every other crate classifies its failures into.

pub mod error;
pub mod id;

pub use error::{ErrorKind, IdParseError};
pub use id::{TenantId, UserId};
