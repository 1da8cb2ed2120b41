use thiserror::Error;

use crate::{CapabilityMatrix, Module, PermissionKind, Profile};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: missing '{kind}' on module '{module}'")]
    Forbidden { module: Module, kind: PermissionKind },

    #[error("forbidden: role '{0}' is not elevated")]
    NotElevated(String),
}

/// Check a single capability against a resolved matrix.
///
/// - No IO
/// - No panics
/// - Absent modules deny
pub fn authorize(
    permissions: &CapabilityMatrix,
    module: Module,
    kind: PermissionKind,
) -> Result<(), AuthzError> {
    if permissions.allows(module, kind) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { module, kind })
    }
}

/// Gate for the settings area: only elevated roles may enter.
pub fn require_elevated(profile: Option<&Profile>) -> Result<(), AuthzError> {
    match profile {
        None => Err(AuthzError::Unauthenticated),
        Some(p) if p.is_elevated() => Ok(()),
        Some(p) => Err(AuthzError::NotElevated(p.role.to_string())),
    }
}
