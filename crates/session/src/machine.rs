//! Session lifecycle state machine.
//!
//! Pure and synchronous: inputs are auth events and the results of remote
//! calls, outputs are [`Effect`]s the driver must execute. Every chain
//! (session → profile → permissions) carries a [`ChainTag`]; results whose
//! tag is not the one currently in flight are dropped.
//!
//! ```text
//! Initializing ──(no session)──────────────► Unauthenticated
//!      │                                          ▲
//!      └─(session)─► LoadingProfile ─(row)─► LoadingPermissions ─► Ready
//!                          │
//!                          └─(missing / failed)─► Error
//!
//! Established / Refreshed: any state ─► LoadingProfile (new generation)
//! Ended:                   any state ─► Unauthenticated
//! ```

use transdovic_auth::{CapabilityMatrix, Profile, Session};
use transdovic_core::PrincipalId;
use transdovic_infra::{AuthEvent, BackendError};

use crate::snapshot::AuthorizationSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Unauthenticated,
    LoadingProfile {
        session: Session,
    },
    LoadingPermissions {
        session: Session,
        profile: Profile,
    },
    Ready {
        session: Session,
        profile: Profile,
        permissions: CapabilityMatrix,
    },
    /// Signed in, but the profile could not be loaded.
    Error {
        session: Session,
        reason: String,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::LoadingProfile { .. } => "loading_profile",
            SessionState::LoadingPermissions { .. } => "loading_permissions",
            SessionState::Ready { .. } => "ready",
            SessionState::Error { .. } => "error",
        }
    }
}

/// Identifies one resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainTag {
    pub generation: u64,
    pub principal: PrincipalId,
}

/// Remote work requested by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchProfile(ChainTag),
    ResolvePermissions(ChainTag, Profile),
}

#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    generation: u64,
    in_flight: Option<ChainTag>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Initializing,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn in_flight(&self) -> Option<ChainTag> {
        self.in_flight
    }

    pub fn snapshot(&self) -> AuthorizationSnapshot {
        AuthorizationSnapshot::from(&self.state)
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Error { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Result of the startup `get_session()` call.
    ///
    /// Ignored if an auth event already moved the machine on.
    pub fn initial_session(&mut self, result: Result<Option<Session>, BackendError>) -> Option<Effect> {
        if !matches!(self.state, SessionState::Initializing) {
            tracing::debug!(state = self.state.name(), "initial session superseded by an auth event");
            return None;
        }

        match result {
            Ok(Some(session)) => Some(self.begin(session)),
            Ok(None) => {
                self.state = SessionState::Unauthenticated;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "initial session lookup failed; continuing unauthenticated");
                self.state = SessionState::Unauthenticated;
                None
            }
        }
    }

    pub fn session_changed(&mut self, event: AuthEvent) -> Option<Effect> {
        match event {
            AuthEvent::Established(session) | AuthEvent::Refreshed(session) => {
                Some(self.begin(session))
            }
            AuthEvent::Ended => {
                if let Some(tag) = self.in_flight.take() {
                    tracing::debug!(generation = tag.generation, "session ended mid-resolution");
                }
                self.state = SessionState::Unauthenticated;
                None
            }
        }
    }

    pub fn profile_loaded(
        &mut self,
        tag: ChainTag,
        result: Result<Option<Profile>, BackendError>,
    ) -> Option<Effect> {
        if !self.is_current(tag) {
            tracing::debug!(generation = tag.generation, principal = %tag.principal, "discarding stale profile result");
            return None;
        }

        let session = match std::mem::replace(&mut self.state, SessionState::Unauthenticated) {
            SessionState::LoadingProfile { session } => session,
            other => {
                self.state = other;
                return None;
            }
        };

        match result {
            Ok(Some(profile)) if profile.id == tag.principal => {
                self.state = SessionState::LoadingPermissions {
                    session,
                    profile: profile.clone(),
                };
                Some(Effect::ResolvePermissions(tag, profile))
            }
            Ok(Some(profile)) => {
                tracing::error!(principal = %tag.principal, profile = %profile.id, "profile row does not match session principal");
                self.fail(session, "profile does not belong to the session principal".to_string())
            }
            Ok(None) => {
                tracing::warn!(principal = %tag.principal, "no profile row for principal");
                self.fail(session, "profile not found".to_string())
            }
            Err(e) => {
                tracing::error!(principal = %tag.principal, error = %e, "profile fetch failed");
                self.fail(session, e.to_string())
            }
        }
    }

    /// Returns whether the result was applied.
    pub fn permissions_resolved(&mut self, tag: ChainTag, permissions: CapabilityMatrix) -> bool {
        if !self.is_current(tag) {
            tracing::debug!(generation = tag.generation, principal = %tag.principal, "discarding stale permission result");
            return false;
        }

        match std::mem::replace(&mut self.state, SessionState::Unauthenticated) {
            SessionState::LoadingPermissions { session, profile } => {
                self.in_flight = None;
                self.state = SessionState::Ready {
                    session,
                    profile,
                    permissions,
                };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    fn begin(&mut self, session: Session) -> Effect {
        self.generation += 1;
        let tag = ChainTag {
            generation: self.generation,
            principal: session.principal_id(),
        };
        if let Some(previous) = self.in_flight.replace(tag) {
            tracing::debug!(superseded = previous.generation, generation = tag.generation, "superseding in-flight resolution");
        }
        self.state = SessionState::LoadingProfile { session };
        Effect::FetchProfile(tag)
    }

    fn fail(&mut self, session: Session, reason: String) -> Option<Effect> {
        self.in_flight = None;
        self.state = SessionState::Error { session, reason };
        None
    }

    fn is_current(&self, tag: ChainTag) -> bool {
        self.in_flight == Some(tag)
    }
}
