//! Capability matrix: module → CRUD flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{MODULES, Module, ModulePermissions, PermissionKind, RolePermissionRow};

/// Effective capabilities of a principal, per module.
///
/// Lookups are fail-closed: a module without an entry is treated as all-false.
/// Ordered by module so two matrices built from the same data compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMatrix(BTreeMap<Module, ModulePermissions>);

impl CapabilityMatrix {
    /// No modules at all (unauthenticated, failed lookups).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every catalog module present, every flag false.
    pub fn denied() -> Self {
        Self(
            MODULES
                .iter()
                .map(|d| (d.module, ModulePermissions::NONE))
                .collect(),
        )
    }

    /// Every catalog module present, every flag true.
    pub fn all_granted() -> Self {
        Self(
            MODULES
                .iter()
                .map(|d| (d.module, ModulePermissions::ALL))
                .collect(),
        )
    }

    /// Build a catalog-complete matrix from role-permission rows.
    ///
    /// Rows for unknown module keys are skipped. When a module appears more
    /// than once, the last row wins.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a RolePermissionRow>,
    {
        let mut matrix = Self::denied();
        for row in rows {
            match Module::from_key(&row.module) {
                Some(module) => {
                    matrix.0.insert(module, row.permissions);
                }
                None => {
                    tracing::warn!(module = %row.module, "ignoring permission row for unknown module");
                }
            }
        }
        matrix
    }

    pub fn insert(&mut self, module: Module, permissions: ModulePermissions) {
        self.0.insert(module, permissions);
    }

    pub fn get(&self, module: Module) -> ModulePermissions {
        self.0.get(&module).copied().unwrap_or_default()
    }

    pub fn allows(&self, module: Module, kind: PermissionKind) -> bool {
        self.get(module).allows(kind)
    }

    pub fn contains(&self, module: Module) -> bool {
        self.0.contains_key(&module)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no module grants anything (empty or all-false).
    pub fn grants_nothing(&self) -> bool {
        self.0.values().all(ModulePermissions::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Module, ModulePermissions)> + '_ {
        self.0.iter().map(|(m, p)| (*m, *p))
    }

    /// Modules on which `kind` is granted, in catalog order.
    pub fn modules_with(&self, kind: PermissionKind) -> Vec<Module> {
        self.iter()
            .filter(|(_, p)| p.allows(kind))
            .map(|(m, _)| m)
            .collect()
    }
}

impl FromIterator<(Module, ModulePermissions)> for CapabilityMatrix {
    fn from_iter<T: IntoIterator<Item = (Module, ModulePermissions)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
