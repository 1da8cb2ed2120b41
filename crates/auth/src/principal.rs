use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use transdovic_core::PrincipalId;

use crate::Role;

/// Authenticated identity, as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: PrincipalId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
        }
    }
}

/// An authenticated session held by the auth provider.
///
/// Tokens are opaque to this crate and are kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.principal)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The `profiles` row keyed by principal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PrincipalId,
    pub role: Role,
    pub display_name: String,
}

impl Profile {
    pub fn new(id: PrincipalId, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            display_name: display_name.into(),
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }
}
