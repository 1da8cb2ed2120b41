//! In-memory backend for tests/dev.
//!
//! Accounts, profiles and role-permission rows live in process memory. Faults
//! and per-principal latency can be injected to exercise degraded paths.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use transdovic_auth::{
    CapabilityMatrix, Principal, Profile, Role, RolePermissionRow, Session, validate_session,
};
use transdovic_core::PrincipalId;

use super::events::{AuthEventHub, AuthSubscription};
use super::r#trait::{
    AuthEvent, AuthProvider, BackendError, ProfileSource, RolePermissionAdmin,
    RolePermissionSource,
};

#[derive(Debug, Clone)]
struct Account {
    password: String,
    principal: Principal,
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    session_lookup: bool,
    profiles: bool,
    permissions: bool,
    sign_out: bool,
}

#[derive(Debug)]
pub struct InMemoryBackend {
    hub: AuthEventHub,
    session_ttl: chrono::Duration,
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    profiles: RwLock<HashMap<PrincipalId, Profile>>,
    role_permissions: RwLock<HashMap<Role, Vec<RolePermissionRow>>>,
    profile_latency: RwLock<HashMap<PrincipalId, Duration>>,
    faults: RwLock<Faults>,
    profile_lookups: AtomicUsize,
    permission_lookups: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("in-memory backend lock poisoned".to_string())
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            hub: AuthEventHub::new(),
            session_ttl: chrono::Duration::hours(1),
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            profiles: RwLock::new(HashMap::new()),
            role_permissions: RwLock::new(HashMap::new()),
            profile_latency: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
            profile_lookups: AtomicUsize::new(0),
            permission_lookups: AtomicUsize::new(0),
        }
    }

    pub fn hub(&self) -> &AuthEventHub {
        &self.hub
    }

    /// Register an account together with its profile row.
    pub fn add_account(
        &self,
        email: &str,
        password: &str,
        role: Role,
        display_name: &str,
    ) -> PrincipalId {
        let id = PrincipalId::new();
        let principal = Principal::new(id, email);
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    principal,
                },
            );
        }
        self.put_profile(Profile::new(id, role, display_name));
        id
    }

    pub fn put_profile(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.id, profile);
        }
    }

    pub fn remove_profile(&self, id: PrincipalId) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.remove(&id);
        }
    }

    pub fn set_role_permissions(&self, role: Role, rows: Vec<RolePermissionRow>) {
        if let Ok(mut table) = self.role_permissions.write() {
            table.insert(role, rows);
        }
    }

    pub fn role_permissions(&self, role: &Role) -> Vec<RolePermissionRow> {
        self.role_permissions
            .read()
            .ok()
            .and_then(|t| t.get(role).cloned())
            .unwrap_or_default()
    }

    /// Delay profile lookups for one principal.
    pub fn set_profile_latency(&self, id: PrincipalId, latency: Duration) {
        if let Ok(mut map) = self.profile_latency.write() {
            map.insert(id, latency);
        }
    }

    pub fn fail_session_lookup(&self, fail: bool) {
        self.with_faults(|f| f.session_lookup = fail);
    }

    pub fn fail_profiles(&self, fail: bool) {
        self.with_faults(|f| f.profiles = fail);
    }

    pub fn fail_permissions(&self, fail: bool) {
        self.with_faults(|f| f.permissions = fail);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.with_faults(|f| f.sign_out = fail);
    }

    pub fn profile_lookups(&self) -> usize {
        self.profile_lookups.load(Ordering::SeqCst)
    }

    pub fn permission_lookups(&self) -> usize {
        self.permission_lookups.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    /// Install a session for `email` without emitting an event, as if it had
    /// been persisted by an earlier run.
    pub fn restore_session(&self, email: &str) -> Option<Session> {
        let session = self.mint_session(email)?;
        if let Ok(mut current) = self.session.write() {
            *current = Some(session.clone());
        }
        Some(session)
    }

    /// Rotate the current session's tokens and emit [`AuthEvent::Refreshed`].
    pub fn refresh_session(&self) -> Option<Session> {
        let refreshed = {
            let mut current = self.session.write().ok()?;
            let session = current.as_mut()?;
            session.access_token = Uuid::now_v7().to_string();
            session.expires_at = Utc::now() + self.session_ttl;
            session.clone()
        };
        self.hub.publish(AuthEvent::Refreshed(refreshed.clone()));
        Some(refreshed)
    }

    /// Drop the current session as the provider would on revocation.
    pub fn revoke_session(&self) {
        if let Ok(mut current) = self.session.write() {
            *current = None;
        }
        self.hub.publish(AuthEvent::Ended);
    }

    fn mint_session(&self, email: &str) -> Option<Session> {
        let accounts = self.accounts.read().ok()?;
        let account = accounts.get(email)?;
        Some(Session {
            principal: account.principal.clone(),
            access_token: Uuid::now_v7().to_string(),
            refresh_token: Some(Uuid::now_v7().to_string()),
            expires_at: Utc::now() + self.session_ttl,
        })
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.write() {
            f(&mut faults);
        }
    }

    fn faults(&self) -> Faults {
        self.faults.read().map(|f| *f).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl AuthProvider for InMemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        if self.faults().session_lookup {
            return Err(BackendError::Unavailable("session lookup failed".to_string()));
        }
        let session = self.session.read().map_err(|_| poisoned())?.clone();
        Ok(session.filter(|s| validate_session(s, Utc::now()).is_ok()))
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.hub.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let known = {
            let accounts = self.accounts.read().map_err(|_| poisoned())?;
            accounts.get(email).is_some_and(|a| a.password == password)
        };
        if !known {
            return Err(BackendError::InvalidCredentials);
        }

        let session = self.mint_session(email).ok_or(BackendError::InvalidCredentials)?;
        *self.session.write().map_err(|_| poisoned())? = Some(session.clone());
        self.hub.publish(AuthEvent::Established(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.faults().sign_out {
            return Err(BackendError::Unavailable("sign-out failed".to_string()));
        }
        *self.session.write().map_err(|_| poisoned())? = None;
        self.hub.publish(AuthEvent::Ended);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileSource for InMemoryBackend {
    async fn select_profile_by_id(&self, id: PrincipalId) -> Result<Option<Profile>, BackendError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);

        let latency = self
            .profile_latency
            .read()
            .ok()
            .and_then(|m| m.get(&id).copied());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.faults().profiles {
            return Err(BackendError::Unavailable("profile lookup failed".to_string()));
        }
        let profiles = self.profiles.read().map_err(|_| poisoned())?;
        Ok(profiles.get(&id).cloned())
    }
}

#[async_trait::async_trait]
impl RolePermissionSource for InMemoryBackend {
    async fn select_role_permissions(
        &self,
        role: &Role,
    ) -> Result<Vec<RolePermissionRow>, BackendError> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        if self.faults().permissions {
            return Err(BackendError::Unavailable("permission lookup failed".to_string()));
        }
        Ok(self.role_permissions(role))
    }
}

#[async_trait::async_trait]
impl RolePermissionAdmin for InMemoryBackend {
    async fn save_role_permissions(
        &self,
        role: &Role,
        permissions: &CapabilityMatrix,
    ) -> Result<(), BackendError> {
        if self.faults().permissions {
            return Err(BackendError::Unavailable("permission update failed".to_string()));
        }
        let rows = permissions
            .iter()
            .map(|(module, p)| RolePermissionRow::new(module.key(), p))
            .collect();
        self.role_permissions
            .write()
            .map_err(|_| poisoned())?
            .insert(role.clone(), rows);
        Ok(())
    }
}
