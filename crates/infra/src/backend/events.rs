//! In-process fan-out of auth events to subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use super::r#trait::AuthEvent;

type Listener = (u64, mpsc::UnboundedSender<AuthEvent>);

#[derive(Debug, Default)]
struct HubInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

/// Broadcast hub used by backend adapters to emit [`AuthEvent`]s.
///
/// - No IO
/// - Best-effort fan-out, in publish order per subscriber
/// - Dead subscribers are dropped while publishing
#[derive(Debug, Clone, Default)]
pub struct AuthEventHub {
    inner: Arc<HubInner>,
}

impl AuthEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: AuthEvent) {
        let Ok(mut listeners) = self.inner.listeners.lock() else {
            tracing::error!(event = event.kind(), "auth event hub poisoned; event dropped");
            return;
        };
        listeners.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        // If the lock is poisoned we still hand out a subscription;
        // it just never receives anything.
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push((id, tx));
        }

        AuthSubscription {
            id,
            receiver: rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// Handle to an auth event subscription.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<AuthEvent>,
    hub: Weak<HubInner>,
}

impl AuthSubscription {
    /// Wait for the next event. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if let Ok(mut listeners) = hub.listeners.lock() {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
