//! # Domain Module
//!
//! Core types for the networking layer: addressing, identifiers,
//! revocation state, configuration and errors.

pub mod address;
pub mod config;
pub mod errors;
pub mod revoke;
pub mod value_objects;

pub use address::*;
pub use config::*;
pub use errors::*;
pub use revoke::*;
pub use value_objects::*;
