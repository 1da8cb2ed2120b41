//! Hosted backend boundary.
//!
//! This module defines the infrastructure-facing traits the authorization
//! core consumes (auth provider, profile rows, role-permission rows) without
//! making any transport assumptions, plus the in-memory and HTTP adapters.

pub mod events;
#[cfg(feature = "http")]
pub mod http;
pub mod in_memory;
pub mod r#trait;

pub use events::{AuthEventHub, AuthSubscription};
#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use in_memory::InMemoryBackend;
pub use r#trait::{
    AuthEvent, AuthProvider, Backend, BackendError, ProfileSource, RolePermissionAdmin,
    RolePermissionSource,
};
