//! Compiled-in permission catalog.
//!
//! Closed, process-wide configuration: the operational roles that can be
//! configured from the settings area, the functional modules, and the
//! permission kinds. Nothing here changes at runtime.

use crate::{Module, PermissionKind, Role};

/// Roles with full access. Never looked up remotely.
pub const ELEVATED_ROLES: &[Role] = &[Role::MANAGER, Role::ADMINISTRATOR];

/// Non-elevated roles whose permissions live in the role-permission table.
pub const OPERATIONAL_ROLES: &[Role] = &[
    Role::from_static("CONDUCTOR_CARGA_PESADA"),
    Role::from_static("ASISTENTE_ADMINISTRATIVO"),
    Role::from_static("ASISTENTE_PROCESOS"),
    Role::from_static("CONDUCTOR_PATIO"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub module: Module,
    pub key: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionKindDescriptor {
    pub kind: PermissionKind,
    pub key: &'static str,
    pub name: &'static str,
}

pub const MODULES: &[ModuleDescriptor] = &[
    ModuleDescriptor {
        module: Module::Users,
        key: "USERS",
        name: "User Management",
    },
    ModuleDescriptor {
        module: Module::Providers,
        key: "PROVIDERS",
        name: "Provider Management",
    },
];

pub const PERMISSION_KINDS: &[PermissionKindDescriptor] = &[
    PermissionKindDescriptor {
        kind: PermissionKind::View,
        key: "can_view",
        name: "View",
    },
    PermissionKindDescriptor {
        kind: PermissionKind::Create,
        key: "can_create",
        name: "Create",
    },
    PermissionKindDescriptor {
        kind: PermissionKind::Edit,
        key: "can_edit",
        name: "Edit",
    },
    PermissionKindDescriptor {
        kind: PermissionKind::Delete,
        key: "can_delete",
        name: "Delete",
    },
];
