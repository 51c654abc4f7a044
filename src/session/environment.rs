//! Browser environment detection for choosing the sign-in mode.
//!
//! User-agent sniffing is only the fallback: when the page can report whether
//! popups actually work, that capability wins.

use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignInMode {
    Popup,
    Redirect,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrowserEnvironment {
    pub host: String,
    pub in_app_browser: bool,
    pub safari: bool,
    /// Result of a popup capability probe, when the page ran one.
    pub popup_supported: Option<bool>,
    pub native_app: bool,
}

impl BrowserEnvironment {
    #[must_use]
    pub fn from_user_agent(user_agent: &str, host: &str) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            in_app_browser: is_in_app_browser(user_agent),
            safari: is_safari(user_agent),
            popup_supported: None,
            native_app: false,
        }
    }

    #[must_use]
    pub fn with_popup_probe(mut self, supported: bool) -> Self {
        self.popup_supported = Some(supported);
        self
    }

    #[must_use]
    pub fn with_native_app(mut self, native: bool) -> Self {
        self.native_app = native;
        self
    }

    /// Redirect for native shells, in-app browsers and the Safari family,
    /// popup elsewhere; a probe result overrides the sniffing.
    #[must_use]
    pub fn sign_in_mode(&self) -> SignInMode {
        if self.native_app {
            return SignInMode::Redirect;
        }
        match self.popup_supported {
            Some(true) => SignInMode::Popup,
            Some(false) => SignInMode::Redirect,
            None if self.in_app_browser || self.safari => SignInMode::Redirect,
            None => SignInMode::Popup,
        }
    }

    /// Exact host or any subdomain of an authorized domain. An empty list
    /// allows every host.
    #[must_use]
    pub fn is_authorized(&self, authorized_domains: &[String]) -> bool {
        if authorized_domains.is_empty() {
            return true;
        }
        let host = self.host.split(':').next().unwrap_or_default();
        authorized_domains.iter().any(|domain| {
            let domain = domain.trim().to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}

#[must_use]
pub fn is_in_app_browser(user_agent: &str) -> bool {
    Regex::new(r"FBAN|FBAV|Twitter|Instagram|\bLine/|KAKAOTALK")
        .is_ok_and(|re| re.is_match(user_agent))
}

#[must_use]
pub fn is_safari(user_agent: &str) -> bool {
    user_agent.contains("Safari")
        && !user_agent.contains("Chrome")
        && !user_agent.contains("CriOS")
        && !user_agent.contains("Android")
}
