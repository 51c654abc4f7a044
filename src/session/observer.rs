//! Session observer: fan-out of identity changes to any number of cancellable
//! subscriptions. Providers publish into it; the route guard (and anything
//! else interested) subscribes. Each subscription owns its own channel, so
//! disposing one never affects the others.

use crate::session::{error::AuthObservationError, types::Identity};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type ObserverEvent = Result<Option<Identity>, AuthObservationError>;

#[derive(Default)]
struct ObserverState {
    // `None` until the provider has finished its first session check.
    current: Option<Option<Identity>>,
    failure: Option<AuthObservationError>,
    listeners: HashMap<u64, mpsc::UnboundedSender<ObserverEvent>>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct SessionObserver {
    inner: Arc<Mutex<ObserverState>>,
}

impl SessionObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ObserverState> {
        // A poisoned lock only means a listener panicked mid-publish; the map is still valid.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Registers a listener. It receives the current state first (once the
    /// provider knows it) and then every later change.
    ///
    /// # Errors
    ///
    /// Returns the stored failure if the provider subscription already broke.
    pub fn subscribe(&self) -> Result<Subscription, AuthObservationError> {
        let mut state = self.lock();
        if let Some(err) = &state.failure {
            return Err(err.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(current) = &state.current {
            let _ = tx.send(Ok(current.clone()));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.insert(id, tx);
        debug!(listener = id, "session listener attached");

        Ok(Subscription {
            id,
            rx,
            observer: Arc::downgrade(&self.inner),
        })
    }

    /// Delivers a sign-in (`Some`) or sign-out (`None`) to every listener.
    pub fn publish(&self, identity: Option<Identity>) {
        let mut state = self.lock();
        if state.failure.is_some() {
            warn!("ignoring session change published after observer failure");
            return;
        }
        state.current = Some(identity.clone());
        state
            .listeners
            .retain(|_, tx| tx.send(Ok(identity.clone())).is_ok());
    }

    /// Marks the provider subscription as broken and detaches every listener.
    pub fn fail(&self, err: AuthObservationError) {
        let mut state = self.lock();
        warn!(error = %err, "session observer failed");
        for (_, tx) in state.listeners.drain() {
            let _ = tx.send(Err(err.clone()));
        }
        state.failure = Some(err);
    }

    /// Last published state, if the provider has reported one.
    #[must_use]
    pub fn current(&self) -> Option<Option<Identity>> {
        self.lock().current.clone()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Handle for one listener; dropping it detaches the listener.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ObserverEvent>,
    observer: Weak<Mutex<ObserverState>>,
}

impl Subscription {
    /// Next notification, or `None` once the observer is gone.
    pub async fn recv(&mut self) -> Option<ObserverEvent> {
        self.rx.recv().await
    }

    /// Detaches this listener only.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.observer.upgrade() {
            let mut state = inner
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if state.listeners.remove(&self.id).is_some() {
                debug!(listener = self.id, "session listener detached");
            }
        }
    }
}
