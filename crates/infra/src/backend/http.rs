//! HTTP adapter for the hosted database-and-auth service.
//!
//! Speaks the service's REST endpoints (`/auth/v1`, `/rest/v1`,
//! `/functions/v1`). The session is kept in memory for the process lifetime
//! and lifecycle events are emitted locally through an [`AuthEventHub`].

use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use transdovic_auth::{
    CapabilityMatrix, Principal, Profile, Role, RolePermissionRow, Session,
    SessionValidationError, validate_session,
};
use transdovic_core::PrincipalId;

use super::events::{AuthEventHub, AuthSubscription};
use super::r#trait::{
    AuthEvent, AuthProvider, BackendError, ProfileSource, RolePermissionAdmin,
    RolePermissionSource,
};

const PROFILE_COLUMNS: &str = "id,cargo,nombres";
const PERMISSION_COLUMNS: &str = "module,can_view,can_create,can_edit,can_delete";
const MANAGE_ROLE_PERMISSIONS: &str = "manage-role-permissions";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: PrincipalId,
    email: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(value: TokenResponse) -> Self {
        Session {
            principal: Principal {
                id: value.user.id,
                email: value.user.email,
            },
            access_token: value.access_token,
            refresh_token: value.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(value.expires_in),
        }
    }
}

/// `profiles` row as stored by the service.
#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: PrincipalId,
    #[serde(rename = "cargo")]
    role: Role,
    #[serde(rename = "nombres", default)]
    display_name: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile::new(row.id, row.role, row.display_name.unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct ManageRolePermissions<'a> {
    role: &'a Role,
    permissions: &'a CapabilityMatrix,
}

fn transport(e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Decode(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("session lock poisoned".to_string())
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    refresh_lock: Mutex<()>,
    hub: AuthEventHub,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            hub: AuthEventHub::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn current(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.session.read().map_err(|_| poisoned())?.clone())
    }

    fn store(&self, session: Option<Session>) -> Result<(), BackendError> {
        *self.session.write().map_err(|_| poisoned())? = session;
        Ok(())
    }

    /// Bearer for row-level-security: the user's token when signed in,
    /// otherwise the anon key.
    async fn bearer(&self) -> Result<String, BackendError> {
        Ok(self
            .fresh_session()
            .await?
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone()))
    }

    async fn get(&self, path: &str) -> Result<reqwest::RequestBuilder, BackendError> {
        let bearer = self.bearer().await?;
        Ok(self
            .client
            .get(self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer))
    }

    fn post(&self, path: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let resp = self
            .post("/auth/v1/token", &self.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token })
            .send()
            .await
            .map_err(transport)?;
        let token: TokenResponse = ensure_success(resp).await?.json().await.map_err(transport)?;
        Ok(token.into())
    }

    /// The stored session, refreshed first if it has expired.
    ///
    /// Runs on every authenticated request. A rejected refresh ends the
    /// session and publishes [`AuthEvent::Ended`].
    async fn fresh_session(&self) -> Result<Option<Session>, BackendError> {
        match self.current()? {
            Some(session) if validate_session(&session, Utc::now()).is_ok() => {
                return Ok(Some(session));
            }
            None => return Ok(None),
            Some(_) => {}
        }

        let _refreshing = self.refresh_lock.lock().await;

        // Re-read: a concurrent request may have refreshed or ended it.
        let Some(session) = self.current()? else {
            return Ok(None);
        };

        match validate_session(&session, Utc::now()) {
            Ok(()) => Ok(Some(session)),
            Err(SessionValidationError::Expired) => {
                let Some(refresh_token) = session.refresh_token.as_deref() else {
                    tracing::info!(principal = %session.principal_id(), "session expired without refresh token");
                    self.end_locally()?;
                    return Ok(None);
                };

                match self.refresh(refresh_token).await {
                    Ok(refreshed) => {
                        tracing::debug!(principal = %refreshed.principal_id(), "session refreshed");
                        self.store(Some(refreshed.clone()))?;
                        self.hub.publish(AuthEvent::Refreshed(refreshed.clone()));
                        Ok(Some(refreshed))
                    }
                    Err(BackendError::Api { status, message }) if status == 400 || status == 401 => {
                        tracing::warn!(status, %message, "refresh token rejected; ending session");
                        self.end_locally()?;
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping unusable session");
                self.end_locally()?;
                Ok(None)
            }
        }
    }

    fn end_locally(&self) -> Result<(), BackendError> {
        self.store(None)?;
        self.hub.publish(AuthEvent::Ended);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthProvider for HttpBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.fresh_session().await
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.hub.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let resp = self
            .post("/auth/v1/token", &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(transport)?;

        let resp = match ensure_success(resp).await {
            Ok(resp) => resp,
            Err(BackendError::Api { status, .. }) if status == 400 || status == 401 => {
                return Err(BackendError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let session: Session = resp.json::<TokenResponse>().await.map_err(transport)?.into();
        self.store(Some(session.clone()))?;
        self.hub.publish(AuthEvent::Established(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(session) = self.current()? else {
            self.hub.publish(AuthEvent::Ended);
            return Ok(());
        };

        let remote = self
            .post("/auth/v1/logout", &session.access_token)
            .send()
            .await
            .map_err(transport);

        // The local session is gone regardless of what the service says.
        self.end_locally()?;

        ensure_success(remote?).await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl ProfileSource for HttpBackend {
    async fn select_profile_by_id(&self, id: PrincipalId) -> Result<Option<Profile>, BackendError> {
        let resp = self
            .get("/rest/v1/profiles")
            .await?
            .query(&[("select", PROFILE_COLUMNS.to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<ProfileRow> = ensure_success(resp).await?.json().await.map_err(transport)?;
        Ok(rows.into_iter().next().map(Profile::from))
    }
}

#[async_trait::async_trait]
impl RolePermissionSource for HttpBackend {
    async fn select_role_permissions(
        &self,
        role: &Role,
    ) -> Result<Vec<RolePermissionRow>, BackendError> {
        let resp = self
            .get("/rest/v1/role_permissions")
            .await?
            .query(&[
                ("select", PERMISSION_COLUMNS.to_string()),
                ("role", format!("eq.{role}")),
            ])
            .send()
            .await
            .map_err(transport)?;
        ensure_success(resp).await?.json().await.map_err(transport)
    }
}

#[async_trait::async_trait]
impl RolePermissionAdmin for HttpBackend {
    async fn save_role_permissions(
        &self,
        role: &Role,
        permissions: &CapabilityMatrix,
    ) -> Result<(), BackendError> {
        let bearer = self
            .fresh_session()
            .await?
            .map(|s| s.access_token)
            .ok_or(BackendError::NotAuthenticated)?;
        let resp = self
            .post(&format!("/functions/v1/{MANAGE_ROLE_PERMISSIONS}"), &bearer)
            .json(&ManageRolePermissions { role, permissions })
            .send()
            .await
            .map_err(transport)?;
        ensure_success(resp).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    const FRESH_TOKEN: &str = "fresh-access";

    /// Canned responses for the hosted service's auth and REST endpoints.
    #[derive(Clone)]
    struct StubService {
        principal: PrincipalId,
        accept_refresh: bool,
        logout_status: StatusCode,
        refreshes: Arc<AtomicUsize>,
    }

    impl StubService {
        fn new(accept_refresh: bool, logout_status: StatusCode) -> Self {
            Self {
                principal: PrincipalId::new(),
                accept_refresh,
                logout_status,
                refreshes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    struct StubServer {
        base_url: String,
        handle: tokio::task::JoinHandle<()>,
    }

    impl StubServer {
        async fn spawn(service: StubService) -> Self {
            let app = Router::new()
                .route("/auth/v1/token", post(token))
                .route("/auth/v1/logout", post(logout))
                .route("/rest/v1/profiles", get(profiles))
                .with_state(service);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind ephemeral port");
            let base_url = format!("http://{}", listener.local_addr().unwrap());

            let handle = tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self { base_url, handle }
        }

        fn backend(&self) -> HttpBackend {
            HttpBackend::new(&self.base_url, "anon", Duration::from_secs(5)).unwrap()
        }
    }

    impl Drop for StubServer {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    async fn token(
        State(service): State<StubService>,
        Query(query): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        if query.get("grant_type").map(String::as_str) != Some("refresh_token") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unsupported_grant_type" })),
            );
        }
        service.refreshes.fetch_add(1, Ordering::SeqCst);
        if !service.accept_refresh {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })));
        }
        (
            StatusCode::OK,
            Json(json!({
                "access_token": FRESH_TOKEN,
                "refresh_token": "rotated",
                "expires_in": 3600,
                "token_type": "bearer",
                "user": { "id": service.principal, "email": "gerencia@transdovic.test" }
            })),
        )
    }

    async fn logout(State(service): State<StubService>) -> StatusCode {
        service.logout_status
    }

    async fn profiles(
        State(service): State<StubService>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if bearer != format!("Bearer {FRESH_TOKEN}") {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "JWT expired" })));
        }
        (
            StatusCode::OK,
            Json(json!([{ "id": service.principal, "cargo": "MANAGER", "nombres": "Gerencia" }])),
        )
    }

    fn stored_session(id: PrincipalId, ttl: chrono::Duration, refresh_token: Option<&str>) -> Session {
        Session {
            principal: Principal::new(id, "gerencia@transdovic.test"),
            access_token: "stale-access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_before_a_lookup() {
        let service = StubService::new(true, StatusCode::NO_CONTENT);
        let server = StubServer::spawn(service.clone()).await;
        let backend = server.backend();
        backend
            .store(Some(stored_session(service.principal, chrono::Duration::minutes(-1), Some("r"))))
            .unwrap();
        let mut events = backend.on_auth_state_change();

        let profile = backend.select_profile_by_id(service.principal).await.unwrap();
        assert_eq!(profile.map(|p| p.role), Some(Role::MANAGER));
        match events.try_recv() {
            Some(AuthEvent::Refreshed(session)) => assert_eq!(session.access_token, FRESH_TOKEN),
            other => panic!("expected a refreshed event, got {other:?}"),
        }
        assert_eq!(service.refreshes(), 1);

        // The rotated session is reused as is.
        backend.select_profile_by_id(service.principal).await.unwrap();
        assert_eq!(service.refreshes(), 1);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn get_session_returns_the_refreshed_session() {
        let service = StubService::new(true, StatusCode::NO_CONTENT);
        let server = StubServer::spawn(service.clone()).await;
        let backend = server.backend();
        backend
            .store(Some(stored_session(service.principal, chrono::Duration::minutes(-1), Some("r"))))
            .unwrap();

        let session = backend.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, FRESH_TOKEN);
        assert_eq!(session.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(backend.current().unwrap(), Some(session));
    }

    #[tokio::test]
    async fn rejected_refresh_ends_the_session() {
        let service = StubService::new(false, StatusCode::NO_CONTENT);
        let server = StubServer::spawn(service.clone()).await;
        let backend = server.backend();
        backend
            .store(Some(stored_session(service.principal, chrono::Duration::minutes(-1), Some("r"))))
            .unwrap();
        let mut events = backend.on_auth_state_change();

        assert_eq!(backend.get_session().await.unwrap(), None);
        assert!(matches!(events.try_recv(), Some(AuthEvent::Ended)));
        assert_eq!(backend.current().unwrap(), None);

        // Later lookups fall back to the anon key.
        let err = backend.select_profile_by_id(service.principal).await.unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 401, .. }));
        assert_eq!(service.refreshes(), 1);
    }

    #[tokio::test]
    async fn expired_session_without_refresh_token_is_dropped() {
        let service = StubService::new(true, StatusCode::NO_CONTENT);
        let server = StubServer::spawn(service.clone()).await;
        let backend = server.backend();
        backend
            .store(Some(stored_session(service.principal, chrono::Duration::minutes(-1), None)))
            .unwrap();
        let mut events = backend.on_auth_state_change();

        assert_eq!(backend.get_session().await.unwrap(), None);
        assert!(matches!(events.try_recv(), Some(AuthEvent::Ended)));
        assert_eq!(service.refreshes(), 0);
    }

    #[tokio::test]
    async fn sign_out_ends_locally_when_logout_fails() {
        let service = StubService::new(true, StatusCode::INTERNAL_SERVER_ERROR);
        let server = StubServer::spawn(service.clone()).await;
        let backend = server.backend();
        backend
            .store(Some(stored_session(service.principal, chrono::Duration::hours(1), Some("r"))))
            .unwrap();
        let mut events = backend.on_auth_state_change();

        let err = backend.sign_out().await.unwrap_err();

        assert!(matches!(err, BackendError::Api { status: 500, .. }));
        assert!(matches!(events.try_recv(), Some(AuthEvent::Ended)));
        assert_eq!(backend.current().unwrap(), None);
    }

    #[tokio::test]
    async fn role_permission_save_requires_a_session() {
        let service = StubService::new(true, StatusCode::NO_CONTENT);
        let server = StubServer::spawn(service).await;
        let backend = server.backend();

        let err = backend
            .save_role_permissions(&Role::new("CONDUCTOR_PATIO"), &CapabilityMatrix::denied())
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::NotAuthenticated);
    }

    #[test]
    fn profile_row_maps_service_columns() {
        let id = PrincipalId::new();
        let json = format!(r#"[{{"id":"{id}","cargo":"CONDUCTOR_PATIO","nombres":null}}]"#);
        let rows: Vec<ProfileRow> = serde_json::from_str(&json).unwrap();
        let profile: Profile = rows.into_iter().next().unwrap().into();
        assert_eq!(profile.id, id);
        assert_eq!(profile.role, Role::new("CONDUCTOR_PATIO"));
        assert_eq!(profile.display_name, "");
    }

    #[test]
    fn token_response_becomes_session() {
        let id = PrincipalId::new();
        let json = format!(
            r#"{{"access_token":"a","refresh_token":"r","expires_in":3600,"token_type":"bearer","user":{{"id":"{id}","email":"x@transdovic.test"}}}}"#
        );
        let token: TokenResponse = serde_json::from_str(&json).unwrap();
        let session: Session = token.into();
        assert_eq!(session.principal_id(), id);
        assert!(session.expires_at > Utc::now());
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn manage_payload_shape() {
        let role = Role::new("ASISTENTE_PROCESOS");
        let matrix = CapabilityMatrix::denied();
        let body = serde_json::to_value(ManageRolePermissions {
            role: &role,
            permissions: &matrix,
        })
        .unwrap();
        assert_eq!(body["role"], "ASISTENTE_PROCESOS");
        assert_eq!(body["permissions"]["USERS"]["can_delete"], false);
    }

    #[test]
    fn base_url_is_normalised() {
        let backend = HttpBackend::new("https://db.transdovic.test/", "anon", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/rest/v1/profiles"), "https://db.transdovic.test/rest/v1/profiles");
    }
}
