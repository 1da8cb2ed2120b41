//! Process-wide authorization context.
//!
//! One driver task owns the [`SessionMachine`] and is the only writer of the
//! published snapshot. Remote calls run as spawned tasks and report back over
//! a channel, so events and results are applied one at a time on the driver.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;

use transdovic_auth::{CapabilityMatrix, Profile, Session};
use transdovic_infra::backend::AuthSubscription;
use transdovic_infra::{Backend, BackendError, PermissionResolver};

use crate::machine::{ChainTag, Effect, SessionMachine};
use crate::snapshot::AuthorizationSnapshot;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("authorization context has shut down")]
    Closed,
}

enum ChainResult {
    InitialSession(Result<Option<Session>, BackendError>),
    Profile(ChainTag, Result<Option<Profile>, BackendError>),
    Permissions(ChainTag, CapabilityMatrix),
}

/// Read-mostly authorization state shared with the rest of the application.
///
/// Construct once at the composition root with [`AuthorizationContext::start`]
/// and release with [`AuthorizationContext::shutdown`]. Dropping the context
/// also stops the driver.
pub struct AuthorizationContext<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    snapshot: watch::Receiver<AuthorizationSnapshot>,
    shutdown: Arc<Notify>,
    driver: Option<JoinHandle<()>>,
}

impl<B: Backend + ?Sized + 'static> AuthorizationContext<B> {
    /// Subscribe to the backend's auth events and start resolving the
    /// current session. Must be called from within a tokio runtime.
    pub fn start(backend: Arc<B>) -> Self {
        let (publisher, snapshot) = watch::channel(AuthorizationSnapshot::initial());
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let events = backend.on_auth_state_change();
        let driver = Driver {
            backend: Arc::clone(&backend),
            resolver: PermissionResolver::new(Arc::clone(&backend)),
            machine: SessionMachine::new(),
            publisher,
            results: results_tx,
        };
        let handle = tokio::spawn(driver.run(events, results_rx, Arc::clone(&shutdown)));

        tracing::info!("authorization context started");

        Self {
            backend,
            snapshot,
            shutdown,
            driver: Some(handle),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthorizationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationSnapshot> {
        self.snapshot.clone()
    }

    /// Wait for the first snapshot matching `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<AuthorizationSnapshot, ContextError>
    where
        F: FnMut(&AuthorizationSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snap = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| ContextError::Closed)?;
        Ok(snap.clone())
    }

    pub async fn wait_until_loaded(&self) -> Result<AuthorizationSnapshot, ContextError> {
        self.wait_for(|s| !s.loading).await
    }

    /// Delegates to the provider. The snapshot changes once the resulting
    /// session event has been processed; a rejected sign-in leaves it as is.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ContextError> {
        match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                tracing::info!(principal = %session.principal_id(), "signed in");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in rejected");
                Err(e.into())
            }
        }
    }

    /// Delegates to the provider; local state is cleared when the
    /// `Ended` event arrives.
    pub async fn sign_out(&self) -> Result<(), ContextError> {
        self.backend.sign_out().await?;
        Ok(())
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Stop the driver and release the auth-event subscription.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.driver.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "authorization driver task failed");
            }
        }
        tracing::info!("authorization context shut down");
    }
}

impl<B: Backend + ?Sized + 'static> Drop for AuthorizationContext<B> {
    fn drop(&mut self) {
        // Stores a permit, so the driver stops even if it is not waiting yet.
        self.shutdown.notify_one();
    }
}

struct Driver<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    resolver: PermissionResolver<B>,
    machine: SessionMachine,
    publisher: watch::Sender<AuthorizationSnapshot>,
    results: mpsc::UnboundedSender<ChainResult>,
}

impl<B: Backend + ?Sized + 'static> Driver<B> {
    async fn run(
        mut self,
        mut events: AuthSubscription,
        mut results: mpsc::UnboundedReceiver<ChainResult>,
        shutdown: Arc<Notify>,
    ) {
        self.spawn_initial_session();

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        tracing::info!(event = event.kind(), "auth state changed");
                        let effect = self.machine.session_changed(event);
                        self.step(effect);
                    }
                    None => {
                        tracing::warn!("auth event stream closed");
                        break;
                    }
                },
                Some(result) = results.recv() => self.on_result(result),
            }
        }

        events.unsubscribe();
        tracing::debug!("auth event subscription released");
    }

    fn on_result(&mut self, result: ChainResult) {
        match result {
            ChainResult::InitialSession(result) => {
                let effect = self.machine.initial_session(result);
                self.step(effect);
            }
            ChainResult::Profile(tag, result) => {
                let effect = self.machine.profile_loaded(tag, result);
                self.step(effect);
            }
            ChainResult::Permissions(tag, permissions) => {
                if self.machine.permissions_resolved(tag, permissions) {
                    tracing::info!(
                        principal = %tag.principal,
                        generation = tag.generation,
                        "authorization ready"
                    );
                }
                self.publish();
            }
        }
    }

    /// Publish the new state, then start whatever remote work it asked for.
    fn step(&mut self, effect: Option<Effect>) {
        self.publish();
        match effect {
            Some(Effect::FetchProfile(tag)) => self.spawn_profile_fetch(tag),
            Some(Effect::ResolvePermissions(tag, profile)) => {
                self.spawn_permission_resolution(tag, profile)
            }
            None => {}
        }
    }

    fn publish(&self) {
        let next = self.machine.snapshot();
        self.publisher.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn spawn_initial_session(&self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.results.clone();
        tokio::spawn(async move {
            let result = backend.get_session().await;
            let _ = tx.send(ChainResult::InitialSession(result));
        });
    }

    fn spawn_profile_fetch(&self, tag: ChainTag) {
        let backend = Arc::clone(&self.backend);
        let tx = self.results.clone();
        tokio::spawn(async move {
            let result = backend.select_profile_by_id(tag.principal).await;
            let _ = tx.send(ChainResult::Profile(tag, result));
        });
    }

    fn spawn_permission_resolution(&self, tag: ChainTag, profile: Profile) {
        let resolver = self.resolver.clone();
        let tx = self.results.clone();
        tokio::spawn(async move {
            let permissions = resolver.resolve(Some(&profile)).await;
            let _ = tx.send(ChainResult::Permissions(tag, permissions));
        });
    }
}
