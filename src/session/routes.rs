//! Route zones and the pure routing rule.

use crate::session::types::StatusKind;
use std::collections::BTreeSet;

pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const DASHBOARD: &str = "/dashboard";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    public: BTreeSet<String>,
    public_home: String,
    protected_home: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(LOGIN, DASHBOARD, [LOGIN, SIGNUP])
    }
}

impl RouteTable {
    /// The public home is always part of the public set.
    #[must_use]
    pub fn new<I, S>(public_home: &str, protected_home: &str, public: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let public_home = normalize_path(public_home);
        let mut public: BTreeSet<String> =
            public.into_iter().map(|p| normalize_path(p.as_ref())).collect();
        public.insert(public_home.clone());

        Self {
            public,
            public_home,
            protected_home: normalize_path(protected_home),
        }
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public.contains(&normalize_path(path))
    }

    pub fn public_routes(&self) -> impl Iterator<Item = &str> {
        self.public.iter().map(String::as_str)
    }

    #[must_use]
    pub fn public_home(&self) -> &str {
        &self.public_home
    }

    #[must_use]
    pub fn protected_home(&self) -> &str {
        &self.protected_home
    }

    /// Applies [`decide`] to a path using this table.
    #[must_use]
    pub fn decide(&self, status: StatusKind, path: &str) -> RouteDecision {
        decide(status, &normalize_path(path), self.is_public(path), self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Auth has not settled; render the loading state.
    Loading,
    Stay,
    Navigate(String),
}

/// Pure routing rule. Never proposes navigating to the current path.
#[must_use]
pub fn decide(
    status: StatusKind,
    current_path: &str,
    is_public: bool,
    routes: &RouteTable,
) -> RouteDecision {
    let target = match status {
        StatusKind::Initializing => return RouteDecision::Loading,
        StatusKind::Authenticated if is_public => routes.protected_home(),
        StatusKind::Unauthenticated if !is_public => routes.public_home(),
        _ => return RouteDecision::Stay,
    };

    if target == current_path {
        RouteDecision::Stay
    } else {
        RouteDecision::Navigate(target.to_string())
    }
}

/// Strips query and fragment, collapses duplicate slashes and trims the
/// trailing slash so `/login/?next=x` and `/login` compare equal.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializing_never_navigates() {
        let routes = RouteTable::default();
        assert_eq!(
            routes.decide(StatusKind::Initializing, "/dashboard"),
            RouteDecision::Loading
        );
        assert_eq!(
            routes.decide(StatusKind::Initializing, "/login"),
            RouteDecision::Loading
        );
    }

    #[test]
    fn authenticated_on_public_goes_to_dashboard() {
        let routes = RouteTable::default();
        assert_eq!(
            routes.decide(StatusKind::Authenticated, "/login"),
            RouteDecision::Navigate(DASHBOARD.to_string())
        );
        assert_eq!(
            routes.decide(StatusKind::Authenticated, "/signup?ref=mail"),
            RouteDecision::Navigate(DASHBOARD.to_string())
        );
        assert_eq!(
            routes.decide(StatusKind::Authenticated, "/quests/42"),
            RouteDecision::Stay
        );
    }

    #[test]
    fn unauthenticated_on_protected_goes_to_login() {
        let routes = RouteTable::default();
        assert_eq!(
            routes.decide(StatusKind::Unauthenticated, "/dashboard/"),
            RouteDecision::Navigate(LOGIN.to_string())
        );
        assert_eq!(
            routes.decide(StatusKind::Unauthenticated, "/signup"),
            RouteDecision::Stay
        );
    }

    #[test]
    fn target_equal_to_current_path_stays() {
        // A misconfigured table whose protected home is public must not loop.
        let routes = RouteTable::new("/login", "/login", ["/signup"]);
        assert_eq!(
            routes.decide(StatusKind::Authenticated, "/login"),
            RouteDecision::Stay
        );
    }

    #[test]
    fn decide_is_stable_for_unchanged_inputs() {
        let routes = RouteTable::default();
        let first = routes.decide(StatusKind::Unauthenticated, "/profile");
        let second = routes.decide(StatusKind::Unauthenticated, "/profile");
        assert_eq!(first, second);
    }

    #[test]
    fn normalize_path_variants() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("login"), "/login");
        assert_eq!(normalize_path("//profile//u1/"), "/profile/u1");
        assert_eq!(normalize_path("/login#top"), "/login");
    }
}
