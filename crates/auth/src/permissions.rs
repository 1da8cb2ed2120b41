use serde::{Deserialize, Serialize};

/// A functional area of the dashboard.
///
/// The module set is closed; a key that is not listed here does not exist as
/// far as authorization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Module {
    #[serde(rename = "USERS")]
    Users,
    #[serde(rename = "PROVIDERS")]
    Providers,
}

impl Module {
    pub const ALL: [Module; 2] = [Module::Users, Module::Providers];

    pub fn key(&self) -> &'static str {
        match self {
            Module::Users => "USERS",
            Module::Providers => "PROVIDERS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Module::Users => "User Management",
            Module::Providers => "Provider Management",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

/// One of the four CRUD capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionKind {
    #[serde(rename = "can_view")]
    View,
    #[serde(rename = "can_create")]
    Create,
    #[serde(rename = "can_edit")]
    Edit,
    #[serde(rename = "can_delete")]
    Delete,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 4] = [
        PermissionKind::View,
        PermissionKind::Create,
        PermissionKind::Edit,
        PermissionKind::Delete,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PermissionKind::View => "can_view",
            PermissionKind::Create => "can_create",
            PermissionKind::Edit => "can_edit",
            PermissionKind::Delete => "can_delete",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PermissionKind::View => "View",
            PermissionKind::Create => "Create",
            PermissionKind::Edit => "Edit",
            PermissionKind::Delete => "Delete",
        }
    }
}

impl core::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-module CRUD flags.
///
/// Every flag defaults to `false`, including when a field is missing from a
/// backend payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulePermissions {
    pub can_view: bool,
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl ModulePermissions {
    pub const NONE: ModulePermissions = ModulePermissions {
        can_view: false,
        can_create: false,
        can_edit: false,
        can_delete: false,
    };

    pub const ALL: ModulePermissions = ModulePermissions {
        can_view: true,
        can_create: true,
        can_edit: true,
        can_delete: true,
    };

    pub fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::View => self.can_view,
            PermissionKind::Create => self.can_create,
            PermissionKind::Edit => self.can_edit,
            PermissionKind::Delete => self.can_delete,
        }
    }

    pub fn set(&mut self, kind: PermissionKind, granted: bool) {
        match kind {
            PermissionKind::View => self.can_view = granted,
            PermissionKind::Create => self.can_create = granted,
            PermissionKind::Edit => self.can_edit = granted,
            PermissionKind::Delete => self.can_delete = granted,
        }
    }

    pub fn granted(&self) -> impl Iterator<Item = PermissionKind> + '_ {
        PermissionKind::ALL.into_iter().filter(|k| self.allows(*k))
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// A row of the `role_permissions` table.
///
/// `module` is kept as the raw key: rows may reference modules that are not
/// (or no longer) in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionRow {
    pub module: String,
    #[serde(flatten)]
    pub permissions: ModulePermissions,
}

impl RolePermissionRow {
    pub fn new(module: impl Into<String>, permissions: ModulePermissions) -> Self {
        Self {
            module: module.into(),
            permissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_flags_deserialize_to_false() {
        let row: RolePermissionRow =
            serde_json::from_str(r#"{"module":"USERS","can_view":true}"#).unwrap();
        assert_eq!(row.module, "USERS");
        assert!(row.permissions.can_view);
        assert!(!row.permissions.can_create);
        assert!(!row.permissions.can_edit);
        assert!(!row.permissions.can_delete);
    }

    #[test]
    fn delete_flag_is_read_from_can_delete() {
        let row: RolePermissionRow = serde_json::from_str(
            r#"{"module":"PROVIDERS","can_view":false,"can_create":false,"can_edit":false,"can_delete":true,"delete":false}"#,
        )
        .unwrap();
        assert!(row.permissions.can_delete);
        assert!(row.permissions.allows(PermissionKind::Delete));
        assert_eq!(row.permissions.granted().collect::<Vec<_>>(), vec![PermissionKind::Delete]);
    }

    #[test]
    fn set_touches_only_one_flag() {
        for kind in PermissionKind::ALL {
            let mut p = ModulePermissions::NONE;
            p.set(kind, true);
            for other in PermissionKind::ALL {
                assert_eq!(p.allows(other), other == kind, "{kind} leaked into {other}");
            }
        }
    }

    #[test]
    fn module_serializes_as_catalog_key() {
        assert_eq!(serde_json::to_string(&Module::Providers).unwrap(), "\"PROVIDERS\"");
        assert_eq!(Module::from_key("USUARIOS"), None);
    }
}
