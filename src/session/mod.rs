//! Session handling: identity observation, profile loading, the auth store and
//! the route guard that ties them together.

pub mod environment;
pub mod error;
pub mod guard;
pub mod http;
pub mod login;
pub mod navigator;
pub mod observer;
pub mod profile;
pub mod provider;
pub mod redirect;
pub mod routes;
pub mod store;
pub mod types;

pub use self::environment::{BrowserEnvironment, SignInMode};
pub use self::error::{
    AuthError, AuthObservationError, NavigationError, ProfileFetchError, RedirectResolutionError,
    SignInError,
};
pub use self::guard::{Mount, MountToken, RouteGuard};
pub use self::http::HttpProfileStore;
pub use self::login::{LoginAction, SignInOutcome};
pub use self::navigator::{Navigator, RecordingNavigator};
pub use self::observer::{SessionObserver, Subscription};
pub use self::profile::{FetchScript, MemoryProfileStore, ProfileStore};
pub use self::provider::{IdentityProvider, MemoryIdentityProvider};
pub use self::redirect::RedirectResolver;
pub use self::routes::{RouteDecision, RouteTable};
pub use self::store::{AuthSnapshot, AuthStore, AuthWriter};
pub use self::types::{AuthStatus, GameStats, Identity, Profile, RedirectOutcome, StatusKind};
