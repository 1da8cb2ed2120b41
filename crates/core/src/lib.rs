//! `transdovic-core` — shared foundation types.
//!
//! This crate contains **pure** primitives (no infrastructure concerns):
//! the error model and strongly-typed identifiers.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::PrincipalId;
