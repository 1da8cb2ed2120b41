use serde::Serialize;

use transdovic_auth::{CapabilityMatrix, Module, PermissionKind, Principal, Profile, Session};

use crate::machine::SessionState;

/// What the view layer gets to see.
///
/// Always rebuilt wholesale from the [`SessionState`]; `profile` and
/// `permissions` are only populated once the whole chain has completed for
/// the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub permissions: CapabilityMatrix,
    pub loading: bool,
}

impl AuthorizationSnapshot {
    /// Process start: nothing known yet.
    pub fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            permissions: CapabilityMatrix::empty(),
            loading: true,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            loading: false,
            ..Self::initial()
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|s| &s.principal)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_elevated(&self) -> bool {
        self.profile.as_ref().is_some_and(Profile::is_elevated)
    }

    pub fn can(&self, module: Module, kind: PermissionKind) -> bool {
        self.permissions.allows(module, kind)
    }
}

impl Default for AuthorizationSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

impl From<&SessionState> for AuthorizationSnapshot {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Initializing => Self::initial(),
            SessionState::Unauthenticated => Self::unauthenticated(),
            SessionState::LoadingProfile { session }
            | SessionState::LoadingPermissions { session, .. } => Self {
                session: Some(session.clone()),
                loading: true,
                ..Self::initial()
            },
            SessionState::Ready {
                session,
                profile,
                permissions,
            } => Self {
                session: Some(session.clone()),
                profile: Some(profile.clone()),
                permissions: permissions.clone(),
                loading: false,
            },
            SessionState::Error { session, .. } => Self {
                session: Some(session.clone()),
                ..Self::unauthenticated()
            },
        }
    }
}
