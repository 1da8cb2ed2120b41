use thiserror::Error;

use transdovic_auth::{CapabilityMatrix, Profile, Role, RolePermissionRow, Session};
use transdovic_core::PrincipalId;

use super::events::AuthSubscription;

/// Session lifecycle notifications emitted by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A new session exists (sign-in, or a session restored at startup).
    Established(Session),
    /// The provider rotated the tokens of the current session.
    Refreshed(Session),
    /// The session is gone (sign-out, revocation, failed refresh).
    Ended,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::Established(s) | AuthEvent::Refreshed(s) => Some(s),
            AuthEvent::Ended => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::Established(_) => "established",
            AuthEvent::Refreshed(_) => "refreshed",
            AuthEvent::Ended => "ended",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no active session")]
    NotAuthenticated,

    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed backend payload: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The hosted service's authentication surface.
///
/// Credential checks and token issuance happen on the provider side; this
/// trait only forwards them.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Subscribe to session lifecycle events.
    ///
    /// The returned handle must be kept for as long as events are wanted;
    /// dropping it (or calling `unsubscribe`) releases the listener.
    fn on_auth_state_change(&self) -> AuthSubscription;

    /// On success the provider also emits [`AuthEvent::Established`].
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, BackendError>;

    /// Invalidate the current session. Emits [`AuthEvent::Ended`].
    async fn sign_out(&self) -> Result<(), BackendError>;
}

/// Read access to the `profiles` table.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    async fn select_profile_by_id(&self, id: PrincipalId) -> Result<Option<Profile>, BackendError>;
}

/// Read access to the persisted role → permission table.
#[async_trait::async_trait]
pub trait RolePermissionSource: Send + Sync {
    async fn select_role_permissions(&self, role: &Role) -> Result<Vec<RolePermissionRow>, BackendError>;
}

/// Write access to the role → permission table (settings area).
#[async_trait::async_trait]
pub trait RolePermissionAdmin: Send + Sync {
    async fn save_role_permissions(
        &self,
        role: &Role,
        permissions: &CapabilityMatrix,
    ) -> Result<(), BackendError>;
}

/// Everything the authorization core needs from the hosted service.
pub trait Backend: AuthProvider + ProfileSource + RolePermissionSource + RolePermissionAdmin {}

impl<T> Backend for T where T: AuthProvider + ProfileSource + RolePermissionSource + RolePermissionAdmin {}
