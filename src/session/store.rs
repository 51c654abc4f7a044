//! Process-wide auth store. Anyone holding an [`AuthStore`] can read or watch
//! the snapshot; the single [`AuthWriter`] is handed to the route guard.

use crate::session::{
    error::AuthError,
    types::{AuthStatus, Profile, StatusKind},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    /// Displayable error; does not by itself change the status.
    pub error: Option<AuthError>,
}

impl AuthSnapshot {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status.kind() == StatusKind::Initializing
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status.kind() == StatusKind::Authenticated
    }
}

#[derive(Clone)]
pub struct AuthStore {
    tx: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthStore {
    /// Creates the store and its only writer.
    #[must_use]
    pub fn new() -> (Self, AuthWriter) {
        let (tx, _) = watch::channel(AuthSnapshot::default());
        let tx = Arc::new(tx);
        (Self { tx: tx.clone() }, AuthWriter { tx })
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Reads a derived value without cloning the whole snapshot.
    pub fn select<T>(&self, selector: impl FnOnce(&AuthSnapshot) -> T) -> T {
        selector(&self.tx.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.select(AuthSnapshot::is_authenticated)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.select(AuthSnapshot::is_loading)
    }

    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.select(|s| s.status.profile().cloned())
    }

    #[must_use]
    pub fn error(&self) -> Option<AuthError> {
        self.select(|s| s.error.clone())
    }
}

/// Write half of the store. Not `Clone`: whoever owns it owns the status.
pub struct AuthWriter {
    tx: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthWriter {
    /// Read handle onto the same store.
    #[must_use]
    pub fn reader(&self) -> AuthStore {
        AuthStore {
            tx: self.tx.clone(),
        }
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.tx.borrow().status.clone()
    }

    /// Replaces the status. Returns whether anything changed. Going back to
    /// `Unknown` after the first determination is refused.
    pub fn set_status(&self, status: AuthStatus) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if status == AuthStatus::Unknown && snapshot.status != AuthStatus::Unknown {
                warn!("refusing to reset a settled auth status to unknown");
                return false;
            }
            if snapshot.status == status {
                return false;
            }
            debug!(from = ?snapshot.status.kind(), to = ?status.kind(), "auth status changed");
            snapshot.status = status;
            true
        })
    }

    pub fn set_error(&self, error: Option<AuthError>) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.error == error {
                return false;
            }
            snapshot.error = error;
            true
        });
    }
}
