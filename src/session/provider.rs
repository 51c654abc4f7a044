//! Identity provider seam. The guard and the login action only rely on the
//! four observable operations below plus the session observer the provider
//! publishes into.

use crate::session::{
    error::{AuthObservationError, RedirectResolutionError, SignInError},
    observer::SessionObserver,
    types::Identity,
};
use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};
use tracing::{debug, instrument};

pub trait IdentityProvider: Send + Sync + 'static {
    /// Observer receiving this provider's sign-in/sign-out notifications.
    fn observer(&self) -> &SessionObserver;

    /// Interactive sign-in in a same-page popup.
    fn sign_in_with_popup(&self) -> impl Future<Output = Result<Identity, SignInError>> + Send;

    /// Starts a full-page redirect sign-in. On a real page nothing after this
    /// call runs; completion shows up through the redirect result.
    fn sign_in_with_redirect(&self) -> impl Future<Output = Result<(), SignInError>> + Send;

    /// Consumes the pending redirect result. The provider hands out a given
    /// result at most once.
    fn take_redirect_result(
        &self,
    ) -> impl Future<Output = Result<Option<Identity>, RedirectResolutionError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthObservationError>> + Send;
}

/// Scriptable in-process provider used by tests and the replay command.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    observer: SessionObserver,
    popup_results: Mutex<VecDeque<Result<Identity, SignInError>>>,
    pending_redirect: Mutex<Option<Result<Identity, String>>>,
    redirect_delay: Mutex<Duration>,
    redirect_starts: AtomicUsize,
    redirect_takes: AtomicUsize,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the provider's own session check or a later change.
    pub fn emit(&self, identity: Option<Identity>) {
        self.observer.publish(identity);
    }

    /// Queues the result of the next popup sign-in.
    pub fn push_popup_result(&self, result: Result<Identity, SignInError>) {
        lock(&self.popup_results).push_back(result);
    }

    /// Arranges a redirect result as if the page just came back from the provider.
    pub fn set_redirect_result(&self, result: Result<Identity, String>) {
        *lock(&self.pending_redirect) = Some(result);
    }

    pub fn set_redirect_delay(&self, delay: Duration) {
        *lock(&self.redirect_delay) = delay;
    }

    #[must_use]
    pub fn redirect_starts(&self) -> usize {
        self.redirect_starts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn redirect_takes(&self) -> usize {
        self.redirect_takes.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl IdentityProvider for MemoryIdentityProvider {
    fn observer(&self) -> &SessionObserver {
        &self.observer
    }

    #[instrument(skip(self))]
    async fn sign_in_with_popup(&self) -> Result<Identity, SignInError> {
        let result = lock(&self.popup_results)
            .pop_front()
            .unwrap_or(Err(SignInError::Cancelled));
        if let Ok(identity) = &result {
            debug!(uid = %identity.uid, "popup sign-in completed");
            self.observer.publish(Some(identity.clone()));
        }
        result
    }

    #[instrument(skip(self))]
    async fn sign_in_with_redirect(&self) -> Result<(), SignInError> {
        self.redirect_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn take_redirect_result(&self) -> Result<Option<Identity>, RedirectResolutionError> {
        self.redirect_takes.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.redirect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.pending_redirect).take() {
            Some(Ok(identity)) => Ok(Some(identity)),
            Some(Err(reason)) => Err(RedirectResolutionError(reason)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), AuthObservationError> {
        self.observer.publish(None);
        Ok(())
    }
}
