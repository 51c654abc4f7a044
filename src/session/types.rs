//! Session data model shared by the observer, the profile store and the route
//! guard. Identities come from the provider and are never mutated here;
//! profiles are application records keyed by the identity uid.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIFE_EXPECTANCY: u16 = 80;

/// Authenticated user handle as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub level: u32,
    pub experience: u64,
    pub quests_completed: u32,
    pub points: u64,
    pub streak: u32,
    #[serde(default)]
    pub achievements: Vec<String>,
    pub next_level_exp: u64,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
            quests_completed: 0,
            points: 0,
            streak: 0,
            achievements: Vec::new(),
            next_level_exp: 100,
        }
    }
}

/// Application-owned per-user record.
///
/// `uid` always equals the owning identity's uid. A missing birth date marks a
/// profile that still needs the initial setup step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub life_expectancy: u16,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub game_stats: GameStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl Profile {
    /// Builds the record created lazily on a first sign-in.
    #[must_use]
    pub fn for_new_identity(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            uid: identity.uid.clone(),
            display_name: identity.display_name.clone().unwrap_or_default(),
            email: identity.email.clone().unwrap_or_default(),
            photo_url: identity.photo_url.clone().unwrap_or_default(),
            birth_date: None,
            life_expectancy: DEFAULT_LIFE_EXPECTANCY,
            is_public: false,
            push_notifications: false,
            game_stats: GameStats::default(),
            created_at: now,
            updated_at: now,
            last_login_at: now,
        }
    }

    #[must_use]
    pub fn needs_setup(&self) -> bool {
        self.birth_date.is_none()
    }

    #[must_use]
    pub fn belongs_to(&self, identity: &Identity) -> bool {
        self.uid == identity.uid
    }
}

/// Authentication status owned by the route guard.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AuthStatus {
    #[default]
    Unknown,
    Authenticated {
        identity: Identity,
        profile: Profile,
    },
    Unauthenticated,
}

impl AuthStatus {
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Unknown => StatusKind::Initializing,
            Self::Authenticated { .. } => StatusKind::Authenticated,
            Self::Unauthenticated => StatusKind::Unauthenticated,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

/// Payload-free view of [`AuthStatus`] used for routing decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Result of consuming the provider's redirect sign-in result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success(Identity),
    None,
    Error(String),
}
