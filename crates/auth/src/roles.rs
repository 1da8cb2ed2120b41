use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier stored on a profile (`cargo` column).
///
/// Roles are opaque strings at this layer and are not hierarchical. The only
/// special treatment is exact-match membership in [`crate::ELEVATED_ROLES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const MANAGER: Role = Role::from_static("MANAGER");
    pub const ADMINISTRATOR: Role = Role::from_static("ADMINISTRATOR");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Elevated roles bypass the role-permission table entirely.
    pub fn is_elevated(&self) -> bool {
        crate::ELEVATED_ROLES.iter().any(|r| r.as_str() == self.as_str())
    }

    /// Whether the role is one of the configurable operational roles.
    pub fn is_operational(&self) -> bool {
        crate::OPERATIONAL_ROLES.iter().any(|r| r.as_str() == self.as_str())
    }

    /// Human-readable label (`CONDUCTOR_PATIO` -> `CONDUCTOR PATIO`).
    pub fn label(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
