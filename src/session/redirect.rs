//! One-shot consumption of the provider's redirect sign-in result.
//!
//! The provider is asked once per page load, from a task the resolver owns, so
//! a guard mount that goes away mid-resolution does not lose the outcome. The
//! outcome is then handed to exactly one mount.

use crate::session::{provider::IdentityProvider, types::RedirectOutcome};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lives for the page load, so guard remounts share the outcome and the
/// delivery marker.
pub struct RedirectResolver<P> {
    provider: Arc<P>,
    started: AtomicBool,
    outcome: Arc<watch::Sender<Option<RedirectOutcome>>>,
    delivered: AtomicBool,
}

impl<P: IdentityProvider> RedirectResolver<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            provider,
            started: AtomicBool::new(false),
            outcome: Arc::new(outcome),
            delivered: AtomicBool::new(false),
        }
    }

    fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let provider = self.provider.clone();
        let outcome = self.outcome.clone();
        tokio::spawn(async move {
            let resolved = match provider.take_redirect_result().await {
                Ok(Some(identity)) => {
                    info!(uid = %identity.uid, "redirect sign-in completed");
                    RedirectOutcome::Success(identity)
                }
                Ok(None) => RedirectOutcome::None,
                Err(err) => {
                    warn!(error = %err, "redirect sign-in failed");
                    RedirectOutcome::Error(err.0)
                }
            };
            outcome.send_replace(Some(resolved));
        });
    }

    /// Waits for the page load's redirect outcome without consuming it.
    /// Starts the resolution on first use.
    pub async fn outcome(&self) -> RedirectOutcome {
        self.start();
        let mut receiver = self.outcome.subscribe();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone().unwrap_or(RedirectOutcome::None),
            Err(_) => RedirectOutcome::None,
        };
        outcome
    }

    /// Marks the outcome as delivered. Only the first caller gets `true`.
    pub fn claim(&self) -> bool {
        !self.delivered.swap(true, Ordering::SeqCst)
    }

    /// Returns the redirect outcome the first time; `None` on every later call
    /// without asking the provider again.
    pub async fn resolve_once(&self) -> RedirectOutcome {
        let outcome = self.outcome().await;
        if self.claim() {
            outcome
        } else {
            debug!("redirect result already consumed");
            RedirectOutcome::None
        }
    }

    /// Whether a mount has taken delivery of the outcome.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }
}
