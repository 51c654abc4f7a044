//! Interactive sign-in. Errors come back to the caller for inline display and
//! are never retried here.

use crate::session::{
    environment::{BrowserEnvironment, SignInMode},
    error::{AuthObservationError, SignInError},
    provider::IdentityProvider,
    types::Identity,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Popup finished in place; the observer reports the same identity.
    Completed(Identity),
    /// The page is leaving for the provider; the redirect resolver picks the
    /// result up on the next load.
    Redirecting,
}

pub struct LoginAction<P> {
    provider: Arc<P>,
    environment: BrowserEnvironment,
    authorized_domains: Vec<String>,
}

impl<P: IdentityProvider> LoginAction<P> {
    #[must_use]
    pub fn new(
        provider: Arc<P>,
        environment: BrowserEnvironment,
        authorized_domains: Vec<String>,
    ) -> Self {
        Self {
            provider,
            environment,
            authorized_domains,
        }
    }

    #[must_use]
    pub fn environment(&self) -> &BrowserEnvironment {
        &self.environment
    }

    /// # Errors
    ///
    /// Returns a categorized [`SignInError`]; the caller turns it into an
    /// inline message with [`SignInError::user_message`].
    #[instrument(skip(self), fields(host = %self.environment.host))]
    pub async fn start_sign_in(&self) -> Result<SignInOutcome, SignInError> {
        if !self.environment.is_authorized(&self.authorized_domains) {
            warn!("sign-in attempted from an unauthorized host");
            return Err(SignInError::UnauthorizedEnvironment {
                host: self.environment.host.clone(),
            });
        }

        match self.environment.sign_in_mode() {
            SignInMode::Popup => {
                let identity = self.provider.sign_in_with_popup().await?;
                info!(uid = %identity.uid, "popup sign-in completed");
                Ok(SignInOutcome::Completed(identity))
            }
            SignInMode::Redirect => {
                self.provider.sign_in_with_redirect().await?;
                info!("redirect sign-in started");
                Ok(SignInOutcome::Redirecting)
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if the provider could not end the session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthObservationError> {
        self.provider.sign_out().await
    }
}
