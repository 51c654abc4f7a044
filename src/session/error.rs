//! Error types for session observation, sign-in, profile loading and navigation.

use thiserror::Error;

/// The provider subscription could not be established or broke down.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("auth observation failed: {0}")]
pub struct AuthObservationError(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SignInError {
    #[error("sign-in cancelled")]
    Cancelled,
    #[error("sign-in popup blocked")]
    PopupBlocked,
    #[error("sign-in not allowed from host {host}")]
    UnauthorizedEnvironment { host: String },
    #[error("sign-in failed: {0}")]
    Unknown(String),
}

impl SignInError {
    /// Message shown inline under the sign-in button.
    #[must_use]
    pub fn user_message(&self, in_app_browser: bool) -> String {
        match self {
            Self::Cancelled => "Sign-in was cancelled. Try again when you are ready.".to_string(),
            Self::PopupBlocked if in_app_browser => {
                "This in-app browser blocks the sign-in window. Open the page in your default browser."
                    .to_string()
            }
            Self::PopupBlocked => {
                "The sign-in window was blocked. Allow popups for this site and try again."
                    .to_string()
            }
            Self::UnauthorizedEnvironment { host } => {
                format!("Sign-in is not available on {host}. Use the official site address.")
            }
            Self::Unknown(_) => "Sign-in failed. Please try again.".to_string(),
        }
    }
}

/// Profile lookups that could not reach the backing store.
///
/// A missing profile is not an error; stores return `Ok(None)` for it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProfileFetchError {
    #[error("profile backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("redirect sign-in result could not be resolved: {0}")]
pub struct RedirectResolutionError(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("navigation to {target} failed: {reason}")]
pub struct NavigationError {
    pub target: String,
    pub reason: String,
}

/// Displayable error held next to the auth status.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Observation(#[from] AuthObservationError),
    #[error(transparent)]
    SignIn(#[from] SignInError),
    #[error(transparent)]
    ProfileFetch(#[from] ProfileFetchError),
    #[error(transparent)]
    Redirect(#[from] RedirectResolutionError),
}

impl AuthError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Observation(_) => {
                "We could not check your session. Reload the page to try again.".to_string()
            }
            Self::SignIn(err) => err.user_message(false),
            Self::ProfileFetch(_) => {
                "Your profile could not be loaded right now. Check your connection.".to_string()
            }
            Self::Redirect(_) => "Signing in did not complete. Please sign in again.".to_string(),
        }
    }

    /// Errors that should block the page instead of showing a banner.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Observation(_))
    }
}
