//! `transdovic-auth` — pure role/permission model for the dashboard.
//!
//! This crate is intentionally decoupled from the hosted backend and from any
//! async runtime: it only knows the catalog, the capability matrix and how to
//! check a request against it.

pub mod authorize;
pub mod catalog;
pub mod matrix;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{AuthzError, authorize, require_elevated};
pub use catalog::{
    ELEVATED_ROLES, MODULES, ModuleDescriptor, OPERATIONAL_ROLES, PERMISSION_KINDS,
    PermissionKindDescriptor,
};
pub use matrix::CapabilityMatrix;
pub use permissions::{Module, ModulePermissions, PermissionKind, RolePermissionRow};
pub use principal::{Principal, Profile, Session};
pub use roles::Role;
pub use session::{SessionValidationError, validate_session};
pub use transdovic_core::PrincipalId;
