//! # Life Progress (session and route guard core)
//!
//! `lifeprogress` holds the client-side auth/routing state machine of the Life
//! Progress app together with the life statistics it shows once a user is in.
//!
//! ## Session lifecycle
//!
//! An identity provider publishes sign-in and sign-out changes into a
//! [`session::SessionObserver`]. The [`session::RouteGuard`] subscribes to it,
//! consumes the one-shot redirect sign-in result, loads (or creates) the
//! profile for every new identity and writes the outcome to the
//! [`session::AuthStore`], which is the only place the rest of the app reads
//! auth state from.
//!
//! - **Routing:** public routes are `/login` and `/signup`. Signed-in users on a
//!   public route are sent to `/dashboard`; everyone else on a protected route
//!   is sent to `/login`. While the status is still unknown nothing navigates.
//! - **Races:** profile loads carry a generation number, so only the result for
//!   the latest identity is ever applied.
//! - **Failures:** a backend outage never produces a fake profile. A failed
//!   refresh keeps the existing session and only shows an error.
//!
//! ## Life progress
//!
//! [`progress::LifeProgress`] turns a birth date and life expectancy into the
//! counters shown on the dashboard.

pub mod cli;
pub mod progress;
pub mod session;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
