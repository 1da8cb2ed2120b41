//! Per-role permission configuration (settings area).

use std::sync::Arc;

use thiserror::Error;

use transdovic_auth::{AuthzError, CapabilityMatrix, OPERATIONAL_ROLES, Profile, Role, require_elevated};
use transdovic_core::DomainError;

use crate::backend::{BackendError, RolePermissionAdmin, RolePermissionSource};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Loads and saves the permission grid of operational roles.
///
/// Unlike the resolver, failures are surfaced: the settings area reports
/// them to the administrator instead of silently denying.
pub struct RoleSettings<B: ?Sized> {
    backend: Arc<B>,
}

impl<B> RoleSettings<B>
where
    B: RolePermissionSource + RolePermissionAdmin + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Roles offered by the role selector.
    pub fn configurable_roles() -> &'static [Role] {
        OPERATIONAL_ROLES
    }

    /// Full grid for `role`: every catalog module, saved rows applied.
    pub async fn load(&self, role: &Role) -> Result<CapabilityMatrix, SettingsError> {
        ensure_configurable(role)?;
        let rows = self.backend.select_role_permissions(role).await?;
        Ok(CapabilityMatrix::from_rows(&rows))
    }

    /// Persist the grid for `role`. Only elevated actors may do this.
    pub async fn save(
        &self,
        actor: Option<&Profile>,
        role: &Role,
        permissions: &CapabilityMatrix,
    ) -> Result<(), SettingsError> {
        require_elevated(actor)?;
        ensure_configurable(role)?;

        let mut grid = CapabilityMatrix::denied();
        for (module, p) in permissions.iter() {
            grid.insert(module, p);
        }

        self.backend.save_role_permissions(role, &grid).await?;
        tracing::info!(
            role = %role,
            actor = ?actor.map(|a| a.id),
            "role permissions saved"
        );
        Ok(())
    }
}

fn ensure_configurable(role: &Role) -> Result<(), DomainError> {
    if role.is_elevated() {
        return Err(DomainError::validation(format!(
            "role '{role}' is elevated and always has full access"
        )));
    }
    if !role.is_operational() {
        return Err(DomainError::validation(format!("unknown role '{role}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use transdovic_auth::{Module, ModulePermissions, PermissionKind, RolePermissionRow};
    use transdovic_core::PrincipalId;

    fn admin() -> Profile {
        Profile::new(PrincipalId::new(), Role::ADMINISTRATOR, "Admin")
    }

    #[tokio::test]
    async fn load_returns_catalog_complete_grid() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_role_permissions(
            Role::new("CONDUCTOR_PATIO"),
            vec![
                RolePermissionRow::new("PROVIDERS", ModulePermissions::ALL),
                RolePermissionRow::new("VEHICLES", ModulePermissions::ALL),
            ],
        );
        let settings = RoleSettings::new(backend);

        let grid = settings.load(&Role::new("CONDUCTOR_PATIO")).await.unwrap();

        assert_eq!(grid.len(), Module::ALL.len());
        assert_eq!(grid.get(Module::Users), ModulePermissions::NONE);
        assert_eq!(grid.get(Module::Providers), ModulePermissions::ALL);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_through_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let settings = RoleSettings::new(backend.clone());
        let role = Role::new("ASISTENTE_ADMINISTRATIVO");

        let mut grid = CapabilityMatrix::empty();
        let mut p = ModulePermissions::NONE;
        p.set(PermissionKind::Edit, true);
        grid.insert(Module::Users, p);

        settings.save(Some(&admin()), &role, &grid).await.unwrap();

        let loaded = settings.load(&role).await.unwrap();
        assert!(loaded.allows(Module::Users, PermissionKind::Edit));
        assert!(loaded.contains(Module::Providers));
        assert_eq!(backend.role_permissions(&role).len(), Module::ALL.len());
    }

    #[tokio::test]
    async fn non_elevated_actor_cannot_save() {
        let backend = Arc::new(InMemoryBackend::new());
        let settings = RoleSettings::new(backend.clone());
        let actor = Profile::new(PrincipalId::new(), Role::new("ASISTENTE_PROCESOS"), "Pat");

        let err = settings
            .save(Some(&actor), &Role::new("CONDUCTOR_PATIO"), &CapabilityMatrix::all_granted())
            .await
            .unwrap_err();

        assert!(matches!(err, SettingsError::Forbidden(AuthzError::NotElevated(_))));
        assert!(backend.role_permissions(&Role::new("CONDUCTOR_PATIO")).is_empty());
    }

    #[tokio::test]
    async fn elevated_and_unknown_roles_are_not_configurable() {
        let settings = RoleSettings::new(Arc::new(InMemoryBackend::new()));

        let err = settings.load(&Role::MANAGER).await.unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(DomainError::Validation(_))));

        let err = settings
            .save(Some(&admin()), &Role::new("INTERN"), &CapabilityMatrix::denied())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown role"));
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_permissions(true);
        let settings = RoleSettings::new(backend);

        let err = settings.load(&Role::new("CONDUCTOR_PATIO")).await.unwrap_err();
        assert!(matches!(err, SettingsError::Backend(_)));
    }
}
