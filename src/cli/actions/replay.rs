//! Replays a session scenario against a mounted route guard.
//!
//! A scenario seeds the in-memory provider and profile store, then walks a list
//! of steps (observer reports, sign-in attempts, route changes, waits). The
//! report printed at the end lists every navigation the guard issued and the
//! auth state it settled on.

use crate::{
    cli::globals::GlobalArgs,
    progress::LifeProgress,
    session::{
        AuthObservationError, AuthStore, BrowserEnvironment, FetchScript, HttpProfileStore,
        Identity, IdentityProvider, LoginAction, MemoryIdentityProvider, MemoryProfileStore,
        Profile, ProfileFetchError, ProfileStore, RecordingNavigator, RouteGuard, SignInOutcome,
        StatusKind,
    },
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub scenario: PathBuf,
    pub profile_url: Option<String>,
    pub timeout: Duration,
}

fn default_path() -> String {
    "/".to_string()
}

const fn default_settle_ms() -> u64 {
    250
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Route the page is loaded on.
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub profiles: Vec<SeedProfile>,
    /// Pending redirect sign-in result, as if the page came back from the provider.
    #[serde(default)]
    pub redirect: Option<RedirectSeed>,
    #[serde(default)]
    pub redirect_delay_ms: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Time given to the guard after the last step.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProfile {
    pub uid: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub life_expectancy: Option<u16>,
}

impl SeedProfile {
    fn into_profile(self) -> Profile {
        let mut profile = Profile::for_new_identity(&Identity::new(self.uid), Utc::now());
        profile.birth_date = self.birth_date;
        if let Some(years) = self.life_expectancy {
            profile.life_expectancy = years;
        }
        profile
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectSeed {
    Success(Identity),
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// The provider reports a session (`null` for signed out).
    Emit { identity: Option<Identity> },
    /// The provider subscription breaks.
    ObserverFailure { reason: String },
    Wait { ms: u64 },
    Visit { path: String },
    Refresh,
    /// Next profile fetch for `uid` answers after a delay.
    SlowFetch { uid: String, delay_ms: u64 },
    /// Next profile fetch for `uid` fails.
    Unavailable {
        uid: String,
        #[serde(default)]
        delay_ms: u64,
    },
    SignIn {
        user_agent: String,
        host: String,
        /// Identity the popup returns; a popup without one is cancelled.
        #[serde(default)]
        popup: Option<Identity>,
    },
    SignOut,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub navigations: Vec<String>,
    pub status: StatusKind,
    pub uid: Option<String>,
    pub error: Option<String>,
    pub needs_setup: Option<bool>,
    pub progress: Option<LifeProgress>,
    pub sign_in: Vec<String>,
}

/// Profile backend used for a replay.
pub enum ReplayStore {
    Memory(MemoryProfileStore),
    Http(HttpProfileStore),
}

impl ReplayStore {
    fn script(&self, uid: &str, script: FetchScript) {
        match self {
            Self::Memory(store) => store.script(uid, script),
            Self::Http(_) => warn!(uid, "fetch scripting ignored for the HTTP profile store"),
        }
    }
}

impl ProfileStore for ReplayStore {
    async fn fetch(&self, uid: &str) -> Result<Option<Profile>, ProfileFetchError> {
        match self {
            Self::Memory(store) => store.fetch(uid).await,
            Self::Http(store) => store.fetch(uid).await,
        }
    }

    async fn put(&self, profile: Profile) -> Result<(), ProfileFetchError> {
        match self {
            Self::Memory(store) => store.put(profile).await,
            Self::Http(store) => store.put(profile).await,
        }
    }
}

/// Runs `scenario` with in-memory collaborators (or the given store) and
/// collects what the guard did.
///
/// # Errors
/// Returns an error if the provider refuses to sign out.
#[instrument(skip_all, fields(path = %scenario.path))]
pub async fn run_scenario(
    scenario: Scenario,
    globals: &GlobalArgs,
    profiles: ReplayStore,
) -> Result<Report> {
    if let ReplayStore::Memory(store) = &profiles {
        for seed in scenario.profiles {
            store.insert(seed.into_profile());
        }
    }

    let provider = Arc::new(MemoryIdentityProvider::new());
    match scenario.redirect {
        Some(RedirectSeed::Success(identity)) => provider.set_redirect_result(Ok(identity)),
        Some(RedirectSeed::Error(reason)) => provider.set_redirect_result(Err(reason)),
        None => {}
    }
    provider.set_redirect_delay(Duration::from_millis(scenario.redirect_delay_ms));

    let navigator = Arc::new(RecordingNavigator::new());
    let profiles = Arc::new(profiles);
    let (store, writer) = AuthStore::new();
    let guard = RouteGuard::new(
        provider.clone(),
        profiles.clone(),
        navigator.clone(),
        globals.route_table(),
        writer,
    );

    let mount = guard.mount(&scenario.path);
    let mut sign_in = Vec::new();

    for step in scenario.steps {
        match step {
            Step::Emit { identity } => provider.emit(identity),
            Step::ObserverFailure { reason } => {
                provider.observer().fail(AuthObservationError(reason));
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Visit { path } => mount.set_path(&path),
            Step::Refresh => mount.refresh_profile(),
            Step::SlowFetch { uid, delay_ms } => {
                profiles.script(&uid, FetchScript::Delay(Duration::from_millis(delay_ms)));
            }
            Step::Unavailable { uid, delay_ms } => {
                profiles.script(
                    &uid,
                    FetchScript::Unavailable(Duration::from_millis(delay_ms)),
                );
            }
            Step::SignIn {
                user_agent,
                host,
                popup,
            } => {
                let environment = BrowserEnvironment::from_user_agent(&user_agent, &host);
                let in_app_browser = environment.in_app_browser;
                if let Some(identity) = popup {
                    provider.push_popup_result(Ok(identity));
                }
                let login = LoginAction::new(
                    provider.clone(),
                    environment,
                    globals.authorized_domains.clone(),
                );
                let message = match login.start_sign_in().await {
                    Ok(SignInOutcome::Completed(identity)) => {
                        format!("signed in as {}", identity.uid)
                    }
                    Ok(SignInOutcome::Redirecting) => "redirecting to the provider".to_string(),
                    Err(err) => err.user_message(in_app_browser),
                };
                info!(%message, "sign-in attempt finished");
                sign_in.push(message);
            }
            Step::SignOut => provider
                .sign_out()
                .await
                .context("provider refused to sign out")?,
        }
    }

    tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;
    let snapshot = store.snapshot();
    mount.unmount();

    let profile = snapshot.status.profile();
    Ok(Report {
        navigations: navigator.issued(),
        status: snapshot.status.kind(),
        uid: snapshot.status.identity().map(|identity| identity.uid.clone()),
        error: snapshot.error.as_ref().map(|err| err.user_message()),
        needs_setup: profile.map(Profile::needs_setup),
        progress: profile.and_then(|profile| LifeProgress::for_profile(profile, Utc::now()).ok()),
        sign_in,
    })
}

/// # Errors
/// Returns an error if the scenario cannot be read or parsed, or the profile
/// backend cannot be set up.
pub async fn execute(args: Args) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.scenario)
        .await
        .with_context(|| format!("cannot read scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("invalid scenario {}", args.scenario.display()))?;

    let profiles = match &args.profile_url {
        Some(url) => ReplayStore::Http(
            HttpProfileStore::new(url, args.timeout).context("invalid profile backend")?,
        ),
        None => ReplayStore::Memory(MemoryProfileStore::new()),
    };

    let report = run_scenario(scenario, &args.globals, profiles).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
