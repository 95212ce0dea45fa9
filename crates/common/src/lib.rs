//! Common types, protocol definitions, and errors shared across `abtool-api` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
