//! Profile → capability matrix resolution.

use std::sync::Arc;

use transdovic_auth::{CapabilityMatrix, Profile};

use crate::backend::RolePermissionSource;

/// Computes the effective capability matrix of a profile.
///
/// Fail-closed: a missing profile, a failed lookup or an unmapped module
/// all resolve to "no access". Resolution never returns an error.
pub struct PermissionResolver<S: ?Sized> {
    source: Arc<S>,
}

impl<S: ?Sized> Clone for PermissionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S> PermissionResolver<S>
where
    S: RolePermissionSource + ?Sized,
{
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, profile: Option<&Profile>) -> CapabilityMatrix {
        let Some(profile) = profile else {
            return CapabilityMatrix::empty();
        };

        // Hardcoded bypass; elevated roles never hit the table.
        if profile.is_elevated() {
            tracing::debug!(principal = %profile.id, role = %profile.role, "elevated role; granting all modules");
            return CapabilityMatrix::all_granted();
        }

        match self.source.select_role_permissions(&profile.role).await {
            Ok(rows) => {
                let matrix = CapabilityMatrix::from_rows(&rows);
                tracing::debug!(
                    principal = %profile.id,
                    role = %profile.role,
                    rows = rows.len(),
                    "resolved role permissions"
                );
                matrix
            }
            Err(e) => {
                tracing::error!(
                    principal = %profile.id,
                    role = %profile.role,
                    error = %e,
                    "role permission lookup failed; denying all modules"
                );
                CapabilityMatrix::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use transdovic_auth::{Module, ModulePermissions, PermissionKind, Role, RolePermissionRow};
    use transdovic_core::PrincipalId;

    fn profile(role: &'static str) -> Profile {
        Profile::new(PrincipalId::new(), Role::from_static(role), "Test User")
    }

    fn view_only() -> ModulePermissions {
        ModulePermissions {
            can_view: true,
            ..ModulePermissions::NONE
        }
    }

    #[tokio::test]
    async fn no_profile_resolves_to_empty() {
        let backend = Arc::new(InMemoryBackend::new());
        let resolver = PermissionResolver::new(backend.clone());

        assert!(resolver.resolve(None).await.is_empty());
        assert_eq!(backend.permission_lookups(), 0);
    }

    #[tokio::test]
    async fn elevated_roles_get_everything_without_lookup() {
        let backend = Arc::new(InMemoryBackend::new());
        // Rows for an elevated role must be ignored.
        backend.set_role_permissions(
            Role::ADMINISTRATOR,
            vec![RolePermissionRow::new("USERS", ModulePermissions::NONE)],
        );
        let resolver = PermissionResolver::new(backend.clone());

        for role in ["MANAGER", "ADMINISTRATOR"] {
            let matrix = resolver.resolve(Some(&profile(role))).await;
            assert_eq!(matrix, CapabilityMatrix::all_granted());
            for module in Module::ALL {
                for kind in PermissionKind::ALL {
                    assert!(matrix.allows(module, kind), "{role} lacks {kind} on {module}");
                }
            }
        }
        assert_eq!(backend.permission_lookups(), 0);
    }

    #[tokio::test]
    async fn operational_role_without_rows_is_denied_everywhere() {
        let backend = Arc::new(InMemoryBackend::new());
        let resolver = PermissionResolver::new(backend.clone());

        let matrix = resolver.resolve(Some(&profile("ASISTENTE_ADMINISTRATIVO"))).await;

        assert_eq!(matrix, CapabilityMatrix::denied());
        assert!(matrix.grants_nothing());
        assert_eq!(backend.permission_lookups(), 1);
    }

    #[tokio::test]
    async fn yard_driver_with_users_view_row() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_role_permissions(
            Role::new("CONDUCTOR_PATIO"),
            vec![RolePermissionRow::new("USERS", view_only())],
        );
        let resolver = PermissionResolver::new(backend.clone());

        let matrix = resolver.resolve(Some(&profile("CONDUCTOR_PATIO"))).await;

        assert_eq!(matrix.get(Module::Users), view_only());
        assert_eq!(matrix.get(Module::Providers), ModulePermissions::NONE);
    }

    #[tokio::test]
    async fn delete_is_kept_apart_from_other_flags() {
        let backend = Arc::new(InMemoryBackend::new());
        let delete_only = ModulePermissions {
            can_delete: true,
            ..ModulePermissions::NONE
        };
        let all_but_delete = ModulePermissions {
            can_delete: false,
            ..ModulePermissions::ALL
        };
        backend.set_role_permissions(
            Role::new("ASISTENTE_PROCESOS"),
            vec![
                RolePermissionRow::new("USERS", delete_only),
                RolePermissionRow::new("PROVIDERS", all_but_delete),
            ],
        );
        let resolver = PermissionResolver::new(backend);

        let matrix = resolver.resolve(Some(&profile("ASISTENTE_PROCESOS"))).await;

        assert!(matrix.allows(Module::Users, PermissionKind::Delete));
        assert!(!matrix.allows(Module::Users, PermissionKind::View));
        assert!(!matrix.allows(Module::Providers, PermissionKind::Delete));
        assert!(matrix.allows(Module::Providers, PermissionKind::Edit));
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_role_permissions(
            Role::new("CONDUCTOR_PATIO"),
            vec![RolePermissionRow::new("USERS", ModulePermissions::ALL)],
        );
        backend.fail_permissions(true);
        let resolver = PermissionResolver::new(backend);

        let matrix = resolver.resolve(Some(&profile("CONDUCTOR_PATIO"))).await;
        assert!(matrix.is_empty());
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_role_permissions(
            Role::new("CONDUCTOR_CARGA_PESADA"),
            vec![
                RolePermissionRow::new("PROVIDERS", view_only()),
                RolePermissionRow::new("USERS", ModulePermissions::ALL),
            ],
        );
        let resolver = PermissionResolver::new(backend);
        let p = profile("CONDUCTOR_CARGA_PESADA");

        let first = resolver.resolve(Some(&p)).await;
        let second = resolver.resolve(Some(&p)).await;
        assert_eq!(first, second);
    }
}
